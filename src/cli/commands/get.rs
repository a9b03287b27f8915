//! `clawvault get`: print or copy a single credential's secret.

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::Result;

/// Execute the `get` command.
pub fn execute(cli: &Cli, service: &str, copy: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let (store, _password) = ctx.open()?;

    let secret = store.get(service)?;

    if copy {
        match copy_to_clipboard(&secret) {
            Ok(()) => {
                output::success(&format!("Copied '{service}' to clipboard"));
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(error = %e, "clipboard unavailable");
                output::warning("Could not copy to clipboard. Displaying instead:");
            }
        }
    }

    println!("{}", secret.as_str());
    Ok(())
}

fn copy_to_clipboard(text: &str) -> std::result::Result<(), arboard::Error> {
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(text.to_owned())
}
