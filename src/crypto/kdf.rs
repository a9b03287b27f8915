//! Password-based key derivation using PBKDF2-HMAC-SHA256.
//!
//! The iteration count is stored in every vault so a vault always
//! re-derives with the parameters it was created with.  The default
//! (100 000) keeps unlock well under a second on commodity hardware
//! while making offline dictionary attacks expensive.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use super::keys::{MasterKey, KEY_LEN};
use crate::errors::{Result, VaultError};

/// Length of the salt in bytes (128 bits).
pub const SALT_LEN: usize = 16;

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Minimum accepted iteration count.
pub const MIN_ITERATIONS: u32 = 10_000;

/// Derive a 32-byte key from a password and salt.
///
/// The same password + salt + iterations always produce the same key.
pub fn derive_key(password: &[u8], salt: &[u8], iterations: u32) -> Result<MasterKey> {
    if password.is_empty() {
        return Err(VaultError::InvalidInput("password cannot be empty".into()));
    }
    if salt.len() < SALT_LEN {
        return Err(VaultError::InvalidInput(format!(
            "salt must be at least {SALT_LEN} bytes (got {})",
            salt.len()
        )));
    }
    if iterations < MIN_ITERATIONS {
        return Err(VaultError::InvalidInput(format!(
            "PBKDF2 iterations must be at least {MIN_ITERATIONS} (got {iterations})"
        )));
    }

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key);

    // MasterKey takes its own copy and wipes it on drop; wipe ours too.
    let master = MasterKey::new(key);
    zeroize::Zeroize::zeroize(&mut key);
    Ok(master)
}

/// Generate a cryptographically random 16-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
