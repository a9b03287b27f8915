//! `clawvault export`: write the vault to a transfer file.
//!
//! Records stay encrypted under the vault key.  With `--encrypt` the
//! whole container is wrapped again under a separate export password.

use std::path::Path;

use crate::cli::output;
use crate::cli::{display_path, prompt_new_password, Cli, Context, EXPORT_PASSWORD_ENV};
use crate::errors::Result;

/// Execute the `export` command.
pub fn execute(cli: &Cli, target: &Path, encrypt: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let (store, _password) = ctx.open()?;

    let export_password = if encrypt {
        output::info("Choose a password for the export file.");
        Some(prompt_new_password(
            EXPORT_PASSWORD_ENV,
            "export",
            ctx.settings.min_password_length,
        )?)
    } else {
        None
    };

    store.export(target, export_password.as_ref().map(|p| p.as_bytes()))?;

    let count = store.credential_count();
    ctx.audit(
        "export",
        None,
        Some(&format!(
            "{count} credentials to {}{}",
            target.display(),
            if encrypt { " (password-protected)" } else { "" }
        )),
    );

    output::success(&format!(
        "Exported {count} credentials to {}",
        display_path(target)
    ));
    if !encrypt {
        output::tip("Secrets stay encrypted under the master password; use --encrypt to add an export password.");
    }
    Ok(())
}
