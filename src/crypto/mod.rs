//! Cryptographic primitives for ClawVault.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 password-based key derivation (`kdf`)
//! - AES-256-GCM record encryption and decryption (`cipher`)
//! - The zeroize-on-drop `MasterKey` (`keys`)

pub mod cipher;
pub mod kdf;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, derive_key, ...};
pub use cipher::{decrypt, encrypt};
pub use kdf::{derive_key, generate_salt, DEFAULT_ITERATIONS, MIN_ITERATIONS, SALT_LEN};
pub use keys::{MasterKey, KEY_LEN};
