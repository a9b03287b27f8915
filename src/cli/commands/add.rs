//! `clawvault add`: store a new credential.

use std::io::{self, IsTerminal, Read};

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{prompt_secret, Cli, Context};
use crate::errors::{Result, VaultError};

/// Execute the `add` command.
pub fn execute(cli: &Cli, service: &str, key: Option<&str>, tags: &[String]) -> Result<()> {
    let ctx = Context::load(cli)?;
    let (mut store, _password) = ctx.unlock()?;

    if store.contains(service) {
        return Err(VaultError::DuplicateService(service.to_string()));
    }

    let secret = read_secret(service, key)?;
    store.add(service, &secret, tags)?;

    let details = (!tags.is_empty()).then(|| format!("tags: {}", tags.join(", ")));
    ctx.audit("add", Some(service), details.as_deref());

    output::success(&format!(
        "Credential '{service}' added ({} total)",
        store.credential_count()
    ));
    Ok(())
}

/// The secret comes from `--key`, piped stdin, or a hidden prompt.
pub(crate) fn read_secret(service: &str, key: Option<&str>) -> Result<Zeroizing<String>> {
    if let Some(k) = key {
        output::warning("Secret provided on command line; it may appear in shell history.");
        return Ok(Zeroizing::new(k.to_string()));
    }

    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = Zeroizing::new(buf.trim_end().to_string());
        if trimmed.is_empty() {
            return Err(VaultError::InvalidInput("no secret on stdin".into()));
        }
        return Ok(trimmed);
    }

    prompt_secret(&format!("Secret for {service}"))
}
