//! Vault module: the encrypted credential store.
//!
//! This module provides:
//! - `Credential` and `CredentialMetadata` types (`credential`)
//! - The JSON container format and atomic file writes (`format`)
//! - The advisory lock serialising writers (`lock`)
//! - The `VaultStore` engine handle (`store`)
//! - Export envelopes (`export`) and backups (`backup`)

pub mod backup;
pub mod credential;
pub mod export;
pub mod format;
pub mod lock;
pub mod store;

// Re-export the most commonly used items.
pub use backup::{BackupInfo, PasswordCheck, RestoreReport};
pub use credential::{Credential, CredentialMetadata};
pub use format::VaultContainer;
pub use store::{ImportOptions, ImportSummary, UnlockOptions, VaultStore};
