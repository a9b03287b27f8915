//! `clawvault backups`: list available backups, newest first.

use crate::cli::output;
use crate::cli::{display_path, Cli, Context};
use crate::errors::Result;
use crate::vault::backup::list_backups;

/// Execute the `backups` command.  Needs no password.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let dir = ctx.backup_dir();
    let backups = list_backups(&dir)?;

    if backups.is_empty() {
        output::info("No backups found.");
        output::tip("Run `clawvault backup` to create one.");
        return Ok(());
    }

    output::info(&format!(
        "Found {} backup(s) in {}:",
        backups.len(),
        display_path(&dir)
    ));
    output::print_backups_table(&backups);
    Ok(())
}
