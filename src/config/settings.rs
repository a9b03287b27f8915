use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::{DEFAULT_ITERATIONS, MIN_ITERATIONS};
use crate::errors::{Result, VaultError};
use crate::vault::UnlockOptions;

/// Environment variable overriding the ClawVault home directory.
pub const HOME_ENV: &str = "CLAWVAULT_HOME";

/// User-level configuration, loaded from `<home>/config.toml`.
///
/// Every field has a sensible default so ClawVault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Vault file name or path (relative paths resolve against home).
    #[serde(default = "default_vault_file")]
    pub vault_file: String,

    /// Backup directory (relative paths resolve against the vault's
    /// directory).  Defaults to `backups` next to the vault.
    #[serde(default)]
    pub backup_dir: Option<String>,

    /// PBKDF2 iterations for new keys (default: 100 000).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Minimum length accepted for a new master password.
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,

    /// How long to wait for another process holding the vault lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Backups to keep after `backup` (0 = keep all).
    #[serde(default)]
    pub max_backups: usize,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_file() -> String {
    "vault.json".to_string()
}

fn default_kdf_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

fn default_min_password_length() -> usize {
    8
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_file: default_vault_file(),
            backup_dir: None,
            kdf_iterations: default_kdf_iterations(),
            min_password_length: default_min_password_length(),
            lock_timeout_ms: default_lock_timeout_ms(),
            max_backups: 0,
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the home directory.
    const FILE_NAME: &'static str = "config.toml";

    /// Load settings from `<home>/config.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(home: &Path) -> Result<Self> {
        let config_path = home.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).map_err(|e| VaultError::io(&config_path, e))?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        settings.validate()?;
        tracing::debug!(path = %config_path.display(), "loaded settings");
        Ok(settings)
    }

    /// Reject settings that would weaken or break the vault.
    pub fn validate(&self) -> Result<()> {
        if self.kdf_iterations < MIN_ITERATIONS {
            return Err(VaultError::ConfigError(format!(
                "kdf_iterations must be at least {MIN_ITERATIONS} (got {})",
                self.kdf_iterations
            )));
        }
        if self.vault_file.trim().is_empty() {
            return Err(VaultError::ConfigError("vault_file cannot be empty".into()));
        }
        Ok(())
    }

    /// Full path to the vault file.
    pub fn vault_path(&self, home: &Path) -> PathBuf {
        home.join(&self.vault_file)
    }

    /// Full path to the backup directory for the vault at `vault_path`.
    pub fn backup_dir(&self, vault_path: &Path) -> PathBuf {
        match &self.backup_dir {
            Some(dir) => vault_path
                .parent()
                .unwrap_or(Path::new("."))
                .join(dir),
            None => crate::vault::backup::default_backup_dir(vault_path),
        }
    }

    /// Convert to engine-level unlock options.
    pub fn unlock_options(&self) -> UnlockOptions {
        UnlockOptions {
            iterations: self.kdf_iterations,
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
        }
    }
}

/// Resolve the ClawVault home directory.
///
/// `CLAWVAULT_HOME` wins; otherwise `~/.clawvault`.
pub fn home_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(HOME_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".clawvault"))
        .ok_or_else(|| {
            VaultError::ConfigError(format!(
                "cannot find a home directory; set {HOME_ENV} to choose where the vault lives"
            ))
        })
}

// ── Tests ────────────────────────────────────────────────────────────
