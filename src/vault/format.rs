//! Vault container format and atomic persistence.
//!
//! A vault file is a pretty-printed JSON document:
//!
//! ```text
//! {
//!   "version": "1.0",
//!   "salt": "<base64, 16+ bytes>",
//!   "iterations": 100000,
//!   "check": "<base64 canary ciphertext>",
//!   "credentials": [ { "service": ..., "encrypted_key": ..., "tags": [...],
//!                      "created": ..., "updated": ... } ]
//! }
//! ```
//!
//! - **version**: only major version `1` is understood.  The version is
//!   checked before anything else in the document is interpreted.
//! - **salt**: PBKDF2 salt, stored in the clear.
//! - **check**: the canary, a fixed plaintext encrypted with the vault
//!   key.  Lets `open` verify the password even when the vault is empty.
//! - **credentials**: sorted by service, unique.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::credential::Credential;
use crate::crypto::cipher::{decrypt, encrypt};
use crate::crypto::kdf::{DEFAULT_ITERATIONS, MIN_ITERATIONS, SALT_LEN};
use crate::crypto::keys::MasterKey;
use crate::errors::{Result, VaultError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Version written by this build.
pub const CURRENT_VERSION: &str = "1.0";

/// Major versions this build can read.
const SUPPORTED_MAJORS: &[u64] = &[1];

/// Fixed plaintext sealed into the `check` field.
const CANARY: &[u8] = b"clawvault-canary-v1";

// ---------------------------------------------------------------------------
// VaultContainer
// ---------------------------------------------------------------------------

/// The persisted whole: salt, KDF parameters, canary and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultContainer {
    /// Format version as read from disk (or `CURRENT_VERSION`).
    pub version: String,

    /// PBKDF2 salt.
    pub salt: Vec<u8>,

    /// PBKDF2 iteration count used with `salt`.
    pub iterations: u32,

    /// Canary ciphertext, absent only in containers written by older tools.
    pub check: Option<Vec<u8>>,

    /// Credentials keyed by service name.
    pub credentials: BTreeMap<String, Credential>,
}

/// On-disk shape used for deserialization.
#[derive(Deserialize)]
struct ContainerRepr {
    version: String,
    #[serde(deserialize_with = "base64_decode")]
    salt: Vec<u8>,
    #[serde(default = "default_iterations")]
    iterations: u32,
    #[serde(default, deserialize_with = "base64_decode_opt")]
    check: Option<Vec<u8>>,
    #[serde(default)]
    credentials: Vec<Credential>,
}

/// Borrowed on-disk shape used for serialization.
#[derive(Serialize)]
struct ContainerOut<'a> {
    version: &'a str,
    #[serde(serialize_with = "base64_encode")]
    salt: &'a [u8],
    iterations: u32,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "base64_encode_opt"
    )]
    check: Option<&'a [u8]>,
    credentials: Vec<&'a Credential>,
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

impl VaultContainer {
    /// Build an empty container for a freshly generated salt.
    pub fn new(salt: Vec<u8>, iterations: u32) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            salt,
            iterations,
            check: None,
            credentials: BTreeMap::new(),
        }
    }

    /// Serialize to the persisted JSON byte format.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let out = ContainerOut {
            version: &self.version,
            salt: &self.salt,
            iterations: self.iterations,
            check: self.check.as_deref(),
            credentials: self.credentials.values().collect(),
        };
        serde_json::to_vec_pretty(&out)
            .map_err(|e| VaultError::FormatError(format!("serialize container: {e}")))
    }

    /// Parse and validate a persisted container.
    ///
    /// The version is validated before the credentials are looked at.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| VaultError::FormatError(format!("vault JSON: {e}")))?;

        let version = value
            .get("version")
            .ok_or_else(|| VaultError::FormatError("missing 'version' field".into()))?;
        let version = version
            .as_str()
            .ok_or_else(|| VaultError::UnsupportedVersion(version.to_string()))?;
        check_version(version)?;

        let repr: ContainerRepr = serde_json::from_value(value)
            .map_err(|e| VaultError::FormatError(format!("vault structure: {e}")))?;

        if repr.salt.len() < SALT_LEN {
            return Err(VaultError::CorruptData(format!(
                "salt must be at least {SALT_LEN} bytes (got {})",
                repr.salt.len()
            )));
        }
        if repr.iterations < MIN_ITERATIONS {
            return Err(VaultError::CorruptData(format!(
                "iteration count {} is below the minimum {MIN_ITERATIONS}",
                repr.iterations
            )));
        }

        let mut credentials = BTreeMap::new();
        for cred in repr.credentials {
            if cred.service.trim().is_empty() {
                return Err(VaultError::CorruptData("credential with empty service".into()));
            }
            if cred.updated_at < cred.created_at {
                return Err(VaultError::CorruptData(format!(
                    "credential '{}' was updated before it was created",
                    cred.service
                )));
            }
            if credentials.contains_key(&cred.service) {
                return Err(VaultError::CorruptData(format!(
                    "duplicate service '{}'",
                    cred.service
                )));
            }
            credentials.insert(cred.service.clone(), cred);
        }

        Ok(Self {
            version: repr.version,
            salt: repr.salt,
            iterations: repr.iterations,
            check: repr.check,
            credentials,
        })
    }

    /// Seal a fresh canary under `key`.
    pub fn seal_check(&mut self, key: &MasterKey) -> Result<()> {
        self.check = Some(encrypt(key.as_bytes(), CANARY)?);
        Ok(())
    }

    /// Verify that `key` is the key this container was written with.
    ///
    /// Uses the canary when present, else the first credential.  An
    /// empty container without a canary cannot be verified and is
    /// accepted.
    pub fn verify_key(&self, key: &MasterKey) -> Result<()> {
        if let Some(check) = &self.check {
            let plain = decrypt(key.as_bytes(), check).map_err(|e| {
                tracing::debug!("canary decryption failed");
                e
            })?;
            if plain.as_slice() != CANARY {
                tracing::debug!("canary decrypted to unexpected content");
                return Err(VaultError::AuthenticationFailed);
            }
            return Ok(());
        }

        match self.credentials.values().next() {
            Some(first) => {
                // Zeroizing wipes the plaintext as soon as it drops.
                let _plain = decrypt(key.as_bytes(), &first.encrypted_key).map_err(|e| {
                    tracing::debug!(service = %first.service, "first credential failed verification");
                    e
                })?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Reject any version whose major component is not supported.
pub(crate) fn check_version(version: &str) -> Result<()> {
    let major = version
        .split('.')
        .next()
        .and_then(|m| m.trim().parse::<u64>().ok())
        .ok_or_else(|| VaultError::UnsupportedVersion(version.to_string()))?;
    if SUPPORTED_MAJORS.contains(&major) {
        Ok(())
    } else {
        Err(VaultError::UnsupportedVersion(version.to_string()))
    }
}

// ---------------------------------------------------------------------------
// File IO
// ---------------------------------------------------------------------------

/// Read a file that must exist, mapping "not found" to `VaultNotFound`.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            VaultError::VaultNotFound(path.to_path_buf())
        } else {
            VaultError::io(path, e)
        }
    })
}

/// Write `bytes` to `path` **atomically** with owner-only permissions.
///
/// 1. Write to a temp file in the same directory and flush it to disk.
/// 2. Rename the temp file over the target path.
///
/// The rename ensures readers never see a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let staged = stage_file(path, bytes)?;
    commit_file(&staged, path)
}

/// Path of the temp file used while writing `path`.
pub fn staging_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ))
}

/// First half of `write_atomic`: fully write and sync the temp file.
///
/// The target file is untouched until `commit_file` runs.
pub fn stage_file(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }

    let tmp_path = staging_path(path);
    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }

    let mut file = opts.open(&tmp_path).map_err(|e| VaultError::io(&tmp_path, e))?;
    // A stale temp file from a crashed run keeps its old mode; reset it.
    set_owner_only(&tmp_path)?;
    file.write_all(bytes).map_err(|e| VaultError::io(&tmp_path, e))?;
    file.sync_all().map_err(|e| VaultError::io(&tmp_path, e))?;

    Ok(tmp_path)
}

/// Second half of `write_atomic`: rename the staged file into place.
pub fn commit_file(staged: &Path, path: &Path) -> Result<()> {
    fs::rename(staged, path).map_err(|e| VaultError::io(path, e))?;
    set_owner_only(path)?;

    // Persist the rename itself.  Not every platform lets us open a
    // directory, so this is best effort.
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

/// Restrict `path` to owner read/write (no-op off Unix).
pub fn set_owner_only(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| VaultError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Create `dir` (and parents) if needed, owner-only on Unix.
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| VaultError::io(dir, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
            .map_err(|e| VaultError::io(dir, e))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded byte fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let encoded = BASE64.encode(data);
    serializer.serialize_str(&encoded)
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}

pub(crate) fn base64_encode_opt<T, S>(
    data: &Option<T>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: serde::Serializer,
{
    match data {
        Some(bytes) => base64_encode(bytes.as_ref(), serializer),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn base64_decode_opt<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<u8>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    s.map(|s| BASE64.decode(&s).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> VaultContainer {
        let mut c = VaultContainer::new(vec![9u8; SALT_LEN], DEFAULT_ITERATIONS);
        let now = Utc::now();
        c.check = Some(vec![1, 2, 3, 4]);
        c.credentials.insert(
            "github".into(),
            Credential {
                service: "github".into(),
                encrypted_key: vec![5, 6, 7],
                tags: vec!["api".into(), "development".into()],
                created_at: now,
                updated_at: now,
                metadata: BTreeMap::new(),
            },
        );
        c
    }

    #[test]
    fn parse_serialize_roundtrip() {
        let c = sample();
        let bytes = c.serialize().unwrap();
        assert_eq!(VaultContainer::parse(&bytes).unwrap(), c);
    }

    #[test]
    fn version_is_checked_before_credentials() {
        // Credentials are garbage, but the version error must win.
        let doc = br#"{"version":"2.0","salt":"AAAA","credentials":42}"#;
        let err = VaultContainer::parse(doc).unwrap_err();
        assert!(matches!(err, VaultError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn minor_versions_are_accepted() {
        let mut c = sample();
        c.version = "1.3".into();
        let bytes = c.serialize().unwrap();
        assert_eq!(VaultContainer::parse(&bytes).unwrap().version, "1.3");
    }

    #[test]
    fn non_numeric_version_is_unsupported() {
        let doc = br#"{"version":"beta","salt":"AAAA"}"#;
        assert!(matches!(
            VaultContainer::parse(doc),
            Err(VaultError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn missing_version_is_format_error() {
        let doc = br#"{"salt":"AAAA"}"#;
        assert!(matches!(
            VaultContainer::parse(doc),
            Err(VaultError::FormatError(_))
        ));
    }

    #[test]
    fn staging_path_is_hidden_sibling() {
        let p = staging_path(Path::new("/tmp/x/vault.json"));
        assert_eq!(p, PathBuf::from("/tmp/x/.vault.json.tmp"));
    }
}
