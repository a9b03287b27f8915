//! `clawvault delete`: remove a credential from the vault.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultError};

/// Execute the `delete` command.
pub fn execute(cli: &Cli, service: &str, force: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let (mut store, _password) = ctx.open()?;

    if !store.contains(service) {
        return Err(VaultError::NotFound(service.to_string()));
    }

    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete credential '{service}'?"))
            .default(false)
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    store.delete(service)?;

    ctx.audit("delete", Some(service), None);
    output::success(&format!("Credential '{service}' deleted"));
    Ok(())
}
