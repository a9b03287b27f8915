//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};

use clap::Parser;
use zeroize::Zeroizing;

use crate::config::{home_dir, Settings};
use crate::errors::{Result, VaultError};
use crate::vault::VaultStore;

/// Environment variable holding the master password (CI/scripts).
pub const PASSWORD_ENV: &str = "CLAWVAULT_PASSWORD";

/// Environment variable holding the new master password for `passwd`.
pub const NEW_PASSWORD_ENV: &str = "CLAWVAULT_NEW_PASSWORD";

/// Environment variable holding the export password for `export -e` / `import -d`.
pub const EXPORT_PASSWORD_ENV: &str = "CLAWVAULT_EXPORT_PASSWORD";

/// ClawVault CLI: encrypted local credential manager.
#[derive(Parser)]
#[command(
    name = "clawvault",
    about = "Encrypted local credential manager",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the vault file (default: ~/.clawvault/vault.json)
    #[arg(long, env = "CLAWVAULT_PATH", global = true)]
    pub vault: Option<PathBuf>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Add a new credential
    Add {
        /// Service name (e.g. github)
        service: String,
        /// API key or secret (omit for interactive prompt)
        #[arg(short, long)]
        key: Option<String>,
        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Print a credential's secret
    Get {
        /// Service name
        service: String,
        /// Copy to the clipboard instead of printing
        #[arg(short, long)]
        copy: bool,
    },

    /// List stored credentials
    List {
        /// Only show credentials with this tag
        #[arg(short, long)]
        tag: Option<String>,
        /// Show tags and timestamps
        #[arg(short, long)]
        verbose: bool,
    },

    /// Search services and tags
    Search {
        /// Case-insensitive substring
        query: String,
    },

    /// Change a credential's secret and/or tags
    Update {
        /// Service name
        service: String,
        /// New API key or secret
        #[arg(short, long)]
        key: Option<String>,
        /// New tags, replacing the existing ones (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Delete a credential
    Delete {
        /// Service name
        service: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Export the vault to a file
    Export {
        /// Output file path
        output: PathBuf,
        /// Protect the export with an additional password
        #[arg(short, long)]
        encrypt: bool,
    },

    /// Import credentials from an export, vault file or backup
    Import {
        /// Path to the file to import
        input: PathBuf,
        /// The export is password-protected (prompt for its password)
        #[arg(short, long)]
        decrypt: bool,
        /// Replace services that already exist
        #[arg(long)]
        overwrite: bool,
        /// Prompt for the master password of the vault the export came from
        #[arg(long)]
        source_password: bool,
    },

    /// Change the master password
    Passwd,

    /// Create a backup of the vault file
    Backup,

    /// List available backups
    Backups,

    /// Restore the vault from a backup
    Restore {
        /// Backup file name (see `clawvault backups`) or path
        backup: String,
        /// Skip the password check after restoring
        #[arg(long)]
        no_verify: bool,
    },

    /// View the audit log of vault operations
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell)
        shell: String,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolved locations and settings for one invocation.
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub vault_path: PathBuf,
}

impl Context {
    /// Load settings from the ClawVault home and resolve the vault path.
    ///
    /// `--vault` / `CLAWVAULT_PATH` override the configured location.
    pub fn load(cli: &Cli) -> Result<Self> {
        let home = home_dir()?;
        let settings = Settings::load(&home)?;
        let vault_path = match &cli.vault {
            Some(path) => path.clone(),
            None => settings.vault_path(&home),
        };
        Ok(Self {
            settings,
            vault_path,
        })
    }

    /// Backup directory for this vault.
    pub fn backup_dir(&self) -> PathBuf {
        self.settings.backup_dir(&self.vault_path)
    }

    /// Prompt for the master password and unlock the vault.
    ///
    /// A missing vault is created on first use; in that case the password
    /// is asked for twice and the minimum length is enforced.
    pub fn unlock(&self) -> Result<(VaultStore, Zeroizing<String>)> {
        let opts = self.settings.unlock_options();
        let password = if self.vault_path.exists() {
            prompt_password("Master password")?
        } else {
            output::info(&format!(
                "No vault at {}; a new one will be created.",
                self.vault_path.display()
            ));
            prompt_new_password(PASSWORD_ENV, "master", self.settings.min_password_length)?
        };
        let store = VaultStore::create_or_unlock(&self.vault_path, password.as_bytes(), &opts)?;
        Ok((store, password))
    }

    /// Unlock an existing vault; never starts a new one.
    pub fn open(&self) -> Result<(VaultStore, Zeroizing<String>)> {
        if !self.vault_path.exists() {
            return Err(VaultError::VaultNotFound(self.vault_path.clone()));
        }
        let password = prompt_password("Master password")?;
        let store = VaultStore::open(
            &self.vault_path,
            password.as_bytes(),
            &self.settings.unlock_options(),
        )?;
        Ok((store, password))
    }

    /// Record an operation in the audit log (no-op without `audit-log`).
    pub fn audit(&self, op: &str, service: Option<&str>, details: Option<&str>) {
        #[cfg(feature = "audit-log")]
        crate::audit::log_audit(&self.vault_path, op, service, details);

        #[cfg(not(feature = "audit-log"))]
        let _ = (op, service, details);
    }
}

/// Get the master password, trying in order:
/// 1. `CLAWVAULT_PASSWORD` env var (CI/scripts)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    prompt_password_from(PASSWORD_ENV, prompt)
}

/// Like `prompt_password`, but reading `env` first.
pub fn prompt_password_from(env: &str, prompt: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = env_password(env) {
        return Ok(pw);
    }
    prompt_secret(prompt)
}

/// Prompt for a new password with confirmation.
///
/// `env` is checked first for scripted use.  Enforces `min_len`.
/// `label` names the password in the prompts ("master", "export").
pub fn prompt_new_password(env: &str, label: &str, min_len: usize) -> Result<Zeroizing<String>> {
    if let Some(pw) = env_password(env) {
        check_password_length(&pw, min_len)?;
        return Ok(pw);
    }

    loop {
        let password = Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt(format!("Choose {label} password"))
                .with_confirmation(
                    format!("Confirm {label} password"),
                    "Passwords do not match, try again",
                )
                .interact()
                .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?,
        );

        if check_password_length(&password, min_len).is_err() {
            output::warning(&format!(
                "Password must be at least {min_len} characters. Try again."
            ));
            continue;
        }

        return Ok(password);
    }
}

/// Read a secret interactively without echo.
pub fn prompt_secret(prompt: &str) -> Result<Zeroizing<String>> {
    let secret = dialoguer::Password::new()
        .with_prompt(prompt)
        .allow_empty_password(false)
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(secret))
}

fn env_password(var: &str) -> Option<Zeroizing<String>> {
    match std::env::var(var) {
        Ok(pw) if !pw.is_empty() => Some(Zeroizing::new(pw)),
        _ => None,
    }
}

/// Reject passwords shorter than `min_len` characters.
pub fn check_password_length(password: &str, min_len: usize) -> Result<()> {
    if password.chars().count() < min_len {
        return Err(VaultError::InvalidInput(format!(
            "password must be at least {min_len} characters"
        )));
    }
    Ok(())
}

/// Display helper: a path relative to the current directory when possible.
pub fn display_path(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn password_length_is_counted_in_characters() {
        assert!(check_password_length("12345678", 8).is_ok());
        assert!(check_password_length("1234567", 8).is_err());
        assert!(check_password_length("pässwörd", 8).is_ok());
    }

    #[test]
    fn parses_repeated_tags() {
        let cli = Cli::parse_from(["clawvault", "add", "github", "-k", "ghp_x", "-t", "dev", "--tag", "ci"]);
        match cli.command {
            Commands::Add { service, key, tags } => {
                assert_eq!(service, "github");
                assert_eq!(key.as_deref(), Some("ghp_x"));
                assert_eq!(tags, vec!["dev", "ci"]);
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn vault_flag_is_global() {
        let cli = Cli::parse_from(["clawvault", "list", "--vault", "/tmp/v.json"]);
        assert_eq!(cli.vault, Some(PathBuf::from("/tmp/v.json")));
    }
}
