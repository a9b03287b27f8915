//! `clawvault restore`: replace the vault with a backup.
//!
//! The current vault is snapshotted first, so a restore can itself be
//! undone with another restore.

use crate::cli::output;
use crate::cli::{display_path, prompt_password, Cli, Context};
use crate::errors::Result;
use crate::vault::backup;
use crate::vault::PasswordCheck;

/// Execute the `restore` command.
pub fn execute(cli: &Cli, name: &str, no_verify: bool) -> Result<()> {
    let ctx = Context::load(cli)?;

    let password = if no_verify {
        None
    } else {
        Some(prompt_password("Master password for the backup")?)
    };

    let report = backup::restore(
        &ctx.vault_path,
        &ctx.backup_dir(),
        name,
        password.as_ref().map(|p| p.as_bytes()),
        ctx.settings.unlock_options().lock_timeout,
    )?;

    ctx.audit(
        "restore",
        None,
        Some(&report.restored_from.display().to_string()),
    );

    if let Some(previous) = &report.previous {
        output::info(&format!(
            "Previous vault saved as {}",
            display_path(&previous.path)
        ));
    }
    output::success(&format!(
        "Restored vault from {}",
        display_path(&report.restored_from)
    ));
    output::info(&format!(
        "Credentials restored: {}",
        report.credential_count
    ));

    match report.password {
        PasswordCheck::Matches | PasswordCheck::NotChecked => {}
        PasswordCheck::Mismatch => output::warning(
            "The password you entered does not open the restored vault; \
             it was sealed under an earlier master password.",
        ),
    }
    Ok(())
}
