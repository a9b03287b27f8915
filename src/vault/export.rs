//! Export envelopes for moving a vault between machines or epochs.
//!
//! An export file is JSON and always says whether it is wrapped, so the
//! importer knows whether to ask for an export password:
//!
//! ```text
//! plain:   {"format":"clawvault-export","version":"1.0","exported":..,
//!           "encrypted":false,"vault":{ <container> }}
//! wrapped: {"format":"clawvault-export","version":"1.0","exported":..,
//!           "encrypted":true,"salt":"..","iterations":100000,"payload":".."}
//! ```
//!
//! In both cases the records inside the container stay encrypted under
//! the source vault key; `payload` adds a second AES-GCM layer over the
//! whole container JSON under a key derived from the export password.
//! A raw vault file (or backup) is also accepted as an import source.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::format::{
    base64_decode_opt, base64_encode_opt, check_version, write_atomic, VaultContainer,
};
use crate::crypto::cipher::{decrypt, encrypt};
use crate::crypto::kdf::{derive_key, generate_salt};
use crate::errors::{Result, VaultError};

/// Value of the `format` field.
pub const EXPORT_FORMAT: &str = "clawvault-export";

/// Envelope version written by this build.
pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
struct ExportEnvelope {
    format: String,
    version: String,
    exported: DateTime<Utc>,
    encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vault: Option<serde_json::Value>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "base64_encode_opt",
        deserialize_with = "base64_decode_opt"
    )]
    salt: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iterations: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "base64_encode_opt",
        deserialize_with = "base64_decode_opt"
    )]
    payload: Option<Vec<u8>>,
}

/// Write `container` to `target` as an export envelope (mode 0600).
pub fn write_export(
    container: &VaultContainer,
    target: &Path,
    export_password: Option<&[u8]>,
    iterations: u32,
) -> Result<()> {
    let inner = container.serialize()?;

    let envelope = match export_password {
        Some(password) => {
            let salt = generate_salt();
            let key = derive_key(password, &salt, iterations)?;
            let payload = encrypt(key.as_bytes(), &inner)?;
            ExportEnvelope {
                format: EXPORT_FORMAT.to_string(),
                version: EXPORT_VERSION.to_string(),
                exported: Utc::now(),
                encrypted: true,
                vault: None,
                salt: Some(salt.to_vec()),
                iterations: Some(iterations),
                payload: Some(payload),
            }
        }
        None => {
            let vault: serde_json::Value = serde_json::from_slice(&inner)
                .map_err(|e| VaultError::FormatError(format!("export: {e}")))?;
            ExportEnvelope {
                format: EXPORT_FORMAT.to_string(),
                version: EXPORT_VERSION.to_string(),
                exported: Utc::now(),
                encrypted: false,
                vault: Some(vault),
                salt: None,
                iterations: None,
                payload: None,
            }
        }
    };

    let bytes = serde_json::to_vec_pretty(&envelope)
        .map_err(|e| VaultError::FormatError(format!("export envelope: {e}")))?;
    write_atomic(target, &bytes)
}

/// Read an export (or raw vault file) and return the container inside.
///
/// A wrapped export needs `export_password`; a wrong one fails with
/// `AuthenticationFailed`.
pub fn read_export(source: &Path, export_password: Option<&[u8]>) -> Result<VaultContainer> {
    let bytes = fs::read(source).map_err(|e| VaultError::io(source, e))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| VaultError::FormatError(format!("import JSON: {e}")))?;

    // Not an envelope: treat it as a vault file or backup.
    if value.get("format").is_none() {
        return VaultContainer::parse(&bytes);
    }

    let envelope = parse_envelope(value)?;
    if !envelope.encrypted {
        let vault = envelope
            .vault
            .ok_or_else(|| VaultError::FormatError("export has no 'vault' section".into()))?;
        let inner = serde_json::to_vec(&vault)
            .map_err(|e| VaultError::FormatError(format!("export vault: {e}")))?;
        if export_password.is_some() {
            tracing::debug!("export is not password-protected; ignoring export password");
        }
        return VaultContainer::parse(&inner);
    }

    let password = export_password.ok_or_else(|| {
        VaultError::InvalidInput("this export is password-protected; an export password is required".into())
    })?;
    let (salt, iterations, payload) = match (envelope.salt, envelope.iterations, envelope.payload) {
        (Some(s), Some(i), Some(p)) => (s, i, p),
        _ => {
            return Err(VaultError::FormatError(
                "encrypted export is missing salt, iterations or payload".into(),
            ))
        }
    };

    let key = derive_key(password, &salt, iterations)?;
    let inner = decrypt(key.as_bytes(), &payload)?;
    VaultContainer::parse(&inner)
}

/// `true` if the export at `source` needs an export password.
pub fn is_password_protected(source: &Path) -> Result<bool> {
    let bytes = fs::read(source).map_err(|e| VaultError::io(source, e))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| VaultError::FormatError(format!("import JSON: {e}")))?;
    if value.get("format").is_none() {
        return Ok(false);
    }
    Ok(parse_envelope(value)?.encrypted)
}

fn parse_envelope(value: serde_json::Value) -> Result<ExportEnvelope> {
    let envelope: ExportEnvelope = serde_json::from_value(value)
        .map_err(|e| VaultError::FormatError(format!("export envelope: {e}")))?;
    if envelope.format != EXPORT_FORMAT {
        return Err(VaultError::FormatError(format!(
            "unknown export format '{}'",
            envelope.format
        )));
    }
    check_version(&envelope.version)?;
    Ok(envelope)
}
