//! Credential and CredentialMetadata types stored inside a vault.
//!
//! Each credential holds its service name, the encrypted key material
//! (as raw bytes), its tags and creation/update timestamps.  The
//! `encrypted_key` field uses the base64 serde helpers from `format`
//! so it serializes as a string in JSON rather than a byte array.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::format::{base64_decode, base64_encode};
use crate::errors::{Result, VaultError};

/// Maximum length of a service name in characters.
const MAX_SERVICE_LEN: usize = 256;

/// A single encrypted credential stored in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Unique, case-sensitive service identifier (e.g. "github").
    pub service: String,

    /// The encrypted key bytes (nonce + ciphertext + tag).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub encrypted_key: Vec<u8>,

    /// Deduplicated tags, in insertion order.
    #[serde(default)]
    pub tags: Vec<String>,

    /// When this credential was first added.
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,

    /// When this credential was last changed.
    #[serde(rename = "updated")]
    pub updated_at: DateTime<Utc>,

    /// Free-form, non-secret annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Credential {
    /// Metadata view of this credential (never includes ciphertext).
    pub fn to_metadata(&self) -> CredentialMetadata {
        CredentialMetadata {
            service: self.service.clone(),
            tags: self.tags.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            metadata: self.metadata.clone(),
        }
    }

    /// `true` if the credential carries `tag` (exact match).
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Lightweight metadata about a credential (no encrypted value).
///
/// Returned by `VaultStore::list` and `VaultStore::search` so callers
/// can display services, tags and timestamps without touching any
/// ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialMetadata {
    pub service: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
}

/// Trim tags, drop empty ones and remove duplicates (first one wins).
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        out.push(tag.to_string());
    }
    out
}

/// Validate that a service name is usable as a vault key.
///
/// Must be non-blank, at most 256 characters, and free of control
/// characters.  Case is preserved and significant.
pub fn validate_service(service: &str) -> Result<()> {
    if service.trim().is_empty() {
        return Err(VaultError::InvalidInput("service name cannot be empty".into()));
    }
    if service.chars().count() > MAX_SERVICE_LEN {
        return Err(VaultError::InvalidInput(format!(
            "service name cannot exceed {MAX_SERVICE_LEN} characters"
        )));
    }
    if service.chars().any(char::is_control) {
        return Err(VaultError::InvalidInput(
            "service name cannot contain control characters".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_tags_dedups_and_keeps_order() {
        let tags = normalize_tags(["api", " dev ", "api", "", "prod", "dev"]);
        assert_eq!(tags, vec!["api", "dev", "prod"]);
    }

    #[test]
    fn service_names_are_validated() {
        assert!(validate_service("github").is_ok());
        assert!(validate_service("GitHub Enterprise").is_ok());
        assert!(validate_service("").is_err());
        assert!(validate_service("   ").is_err());
        assert!(validate_service("bad\nname").is_err());
        assert!(validate_service(&"x".repeat(257)).is_err());
    }

    #[test]
    fn serializes_with_original_field_names() {
        let now = Utc::now();
        let cred = Credential {
            service: "github".into(),
            encrypted_key: vec![1, 2, 3],
            tags: vec!["api".into()],
            created_at: now,
            updated_at: now,
            metadata: BTreeMap::new(),
        };
        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json["encrypted_key"], "AQID");
        assert!(json.get("created").is_some());
        assert!(json.get("updated").is_some());
        assert!(json.get("metadata").is_none());
    }
}
