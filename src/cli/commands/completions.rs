//! `clawvault completions`: generate shell completion scripts.
//!
//! Usage:
//!   clawvault completions bash > ~/.bash_completion.d/clawvault
//!   clawvault completions zsh > ~/.zfunc/_clawvault

use std::io::{self, Write};
use std::str::FromStr;

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::Cli;
use crate::errors::{Result, VaultError};

/// Execute the `completions` command.
pub fn execute(shell: &str) -> Result<()> {
    let shell = parse_shell(shell)?;
    write_completions(shell, &mut io::stdout());
    Ok(())
}

/// Render the completion script for `shell` into `out`.
pub fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
}

fn parse_shell(name: &str) -> Result<Shell> {
    let name = name.trim().to_lowercase();
    let name = if name == "ps" { "powershell" } else { name.as_str() };
    Shell::from_str(name).map_err(|_| {
        VaultError::CommandFailed(format!(
            "unknown shell '{name}' (supported: bash, zsh, fish, powershell, elvish)"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_shells() {
        assert_eq!(parse_shell("bash").unwrap(), Shell::Bash);
        assert_eq!(parse_shell("Zsh").unwrap(), Shell::Zsh);
        assert_eq!(parse_shell("fish").unwrap(), Shell::Fish);
        assert_eq!(parse_shell("ps").unwrap(), Shell::PowerShell);
        assert_eq!(parse_shell("elvish").unwrap(), Shell::Elvish);
    }

    #[test]
    fn parse_unknown_shell_fails() {
        assert!(parse_shell("csh").is_err());
        assert!(parse_shell("").is_err());
    }

    #[test]
    fn bash_script_names_the_binary_and_commands() {
        let mut buf = Vec::new();
        write_completions(Shell::Bash, &mut buf);
        let script = String::from_utf8(buf).unwrap();
        assert!(script.contains("clawvault"));
        assert!(script.contains("restore"));
    }
}
