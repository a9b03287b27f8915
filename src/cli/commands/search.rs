//! `clawvault search`: substring search over services and tags.

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::Result;

/// Execute the `search` command.
pub fn execute(cli: &Cli, query: &str) -> Result<()> {
    let ctx = Context::load(cli)?;
    let (store, _password) = ctx.open()?;

    let matches = store.search(query)?;
    if matches.is_empty() {
        output::info(&format!("No credentials found matching '{query}'"));
        return Ok(());
    }

    output::info(&format!("Found {} credential(s):", matches.len()));
    output::print_service_list(&matches);
    Ok(())
}
