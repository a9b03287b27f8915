//! `clawvault import`: merge credentials from an export, vault file or backup.

use std::path::Path;

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{prompt_password_from, prompt_secret, Cli, Context, EXPORT_PASSWORD_ENV};
use crate::errors::{Result, VaultError};
use crate::vault::export::is_password_protected;
use crate::vault::ImportOptions;

/// Execute the `import` command.
pub fn execute(
    cli: &Cli,
    source: &Path,
    decrypt: bool,
    overwrite: bool,
    ask_source_password: bool,
) -> Result<()> {
    if !source.exists() {
        return Err(VaultError::CommandFailed(format!(
            "import file not found: {}",
            source.display()
        )));
    }

    let ctx = Context::load(cli)?;
    let (mut store, master_password) = ctx.unlock()?;

    let export_password: Option<Zeroizing<String>> =
        if decrypt || is_password_protected(source)? {
            Some(prompt_password_from(EXPORT_PASSWORD_ENV, "Export password")?)
        } else {
            None
        };

    // An export from another epoch was sealed under that vault's master
    // password; default to ours, which covers the common same-user case.
    let source_password = if ask_source_password {
        prompt_secret("Master password of the exporting vault")?
    } else {
        master_password
    };

    let opts = ImportOptions {
        export_password: export_password.as_ref().map(|p| p.as_bytes()),
        source_password: Some(source_password.as_bytes()),
        overwrite,
    };

    let summary = store.import(source, &opts)?;

    ctx.audit(
        "import",
        None,
        Some(&format!(
            "{} added, {} overwritten from {}",
            summary.added,
            summary.overwritten,
            source.display()
        )),
    );

    output::success(&format!(
        "Imported {} credentials from {} ({} new, {} overwritten)",
        summary.added + summary.overwritten,
        source.display(),
        summary.added,
        summary.overwritten
    ));
    Ok(())
}
