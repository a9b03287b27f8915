//! `clawvault list`: show stored credentials (never decrypts).

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli, tag: Option<&str>, verbose: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let (store, _password) = ctx.open()?;

    let credentials = store.list(tag);

    if credentials.is_empty() {
        match tag {
            Some(t) => output::info(&format!("No credentials found with tag '{t}'")),
            None => {
                output::info("No credentials stored yet.");
                output::tip("Run `clawvault add <service>` to add your first credential.");
            }
        }
        return Ok(());
    }

    output::info(&format!("Found {} credential(s):", credentials.len()));
    if verbose {
        output::print_credentials_table(&credentials);
    } else {
        output::print_service_list(&credentials);
    }
    Ok(())
}
