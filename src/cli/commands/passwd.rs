//! `clawvault passwd`: change the master password.
//!
//! Every credential is re-encrypted under a key derived from the new
//! password and a fresh salt, then the vault is written in one step.

use crate::cli::output;
use crate::cli::{prompt_new_password, Cli, Context, NEW_PASSWORD_ENV};
use crate::errors::{Result, VaultError};

/// Execute the `passwd` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;

    output::info("Enter your current master password.");
    let (mut store, old_password) = ctx.open()?;

    output::info("Choose your new master password.");
    let new_password = prompt_new_password(
        NEW_PASSWORD_ENV,
        "new master",
        ctx.settings.min_password_length,
    )?;

    if new_password.as_str() == old_password.as_str() {
        return Err(VaultError::InvalidInput(
            "new password is the same as the current one".into(),
        ));
    }

    store.change_password(old_password.as_bytes(), new_password.as_bytes())?;

    let count = store.credential_count();
    ctx.audit(
        "passwd",
        None,
        Some(&format!("{count} credentials re-encrypted")),
    );

    output::success(&format!(
        "Master password changed ({count} credentials re-encrypted)"
    ));
    output::tip("Existing backups and exports still open with the old password.");
    Ok(())
}
