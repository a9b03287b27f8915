//! `clawvault update`: replace a credential's secret and/or tags.

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::Result;

/// Execute the `update` command.
///
/// Tags given on the command line replace the stored set; with neither
/// `--key` nor `--tag` only the `updated` timestamp moves.
pub fn execute(cli: &Cli, service: &str, key: Option<&str>, tags: &[String]) -> Result<()> {
    let ctx = Context::load(cli)?;
    let (mut store, _password) = ctx.open()?;

    let tags = (!tags.is_empty()).then_some(tags);
    store.update(service, key, tags)?;

    let mut changed = Vec::new();
    if key.is_some() {
        changed.push("key");
    }
    if tags.is_some() {
        changed.push("tags");
    }
    let details = if changed.is_empty() {
        "touched".to_string()
    } else {
        changed.join(", ")
    };
    ctx.audit("update", Some(service), Some(&details));

    output::success(&format!("Credential '{service}' updated"));
    Ok(())
}
