use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in ClawVault.
///
/// Messages never include decrypted secret material.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Crypto errors ---
    /// Wrong master password or tampered ciphertext. The two causes are
    /// deliberately reported with the same message.
    #[error("Authentication failed: wrong password or corrupted data")]
    AuthenticationFailed,

    // --- Credential errors ---
    #[error("Service '{0}' not found")]
    NotFound(String),

    #[error("Service '{0}' already exists (use `update` to change it)")]
    DuplicateService(String),

    #[error("Import conflicts with existing services: {} (use --overwrite to replace them)", .0.join(", "))]
    ImportConflict(Vec<String>),

    // --- Container errors ---
    #[error("Invalid vault format: {0}")]
    FormatError(String),

    #[error("Unsupported vault version '{0}'")]
    UnsupportedVersion(String),

    #[error("Corrupt vault data: {0}")]
    CorruptData(String),

    #[error("Vault not found at {0}")]
    VaultNotFound(PathBuf),

    #[error("Vault at {0} is locked by another process")]
    VaultLocked(PathBuf),

    // --- IO errors ---
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoBare(#[from] std::io::Error),

    // --- Input errors ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Audit error: {0}")]
    AuditError(String),
}

impl VaultError {
    /// Attach a path to an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience type alias for ClawVault results.
pub type Result<T> = std::result::Result<T, VaultError>;
