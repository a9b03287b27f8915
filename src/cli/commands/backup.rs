//! `clawvault backup`: copy the vault file into the backup directory.

use crate::cli::output;
use crate::cli::{display_path, Cli, Context};
use crate::errors::Result;

/// Execute the `backup` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    // Unlocking first proves the caller knows the password and holds the lock.
    let (store, _password) = ctx.open()?;

    let info = store.backup(&ctx.backup_dir(), ctx.settings.max_backups)?;

    ctx.audit("backup", None, Some(&info.name));
    output::success(&format!("Backup created: {}", display_path(&info.path)));
    output::info(&format!(
        "Credentials backed up: {}",
        store.credential_count()
    ));
    Ok(())
}
