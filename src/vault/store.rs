//! The vault engine: high-level operations used by CLI commands.
//!
//! `VaultStore` is the handle for one invocation.  It owns the advisory
//! lock, the parsed container and the derived key, and wraps the format
//! and crypto layers so the rest of the application can work with simple
//! calls like `store.add("github", "ghp_...", &tags)`.
//!
//! Every mutating method persists before returning, and only updates the
//! in-memory container after the atomic write succeeded.  Nothing is kept
//! between invocations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::cipher::{decrypt, encrypt};
use crate::crypto::kdf::{derive_key, generate_salt, DEFAULT_ITERATIONS};
use crate::crypto::keys::MasterKey;
use crate::errors::{Result, VaultError};

use super::backup::{self, BackupInfo};
use super::credential::{normalize_tags, validate_service, Credential, CredentialMetadata};
use super::export;
use super::format::{self, VaultContainer};
use super::lock::{VaultLock, DEFAULT_LOCK_TIMEOUT};

/// Knobs for opening or creating a vault.
#[derive(Debug, Clone, Copy)]
pub struct UnlockOptions {
    /// PBKDF2 iterations for new vaults, password rotations and
    /// password-protected exports.  Existing vaults keep their own.
    pub iterations: u32,
    /// How long to wait for another process holding the vault lock.
    pub lock_timeout: Duration,
}

impl Default for UnlockOptions {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// Options for `VaultStore::import`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions<'a> {
    /// Password protecting the export envelope, if it is wrapped.
    pub export_password: Option<&'a [u8]>,
    /// Master password of the vault the export was taken from.  Needed
    /// only when that vault had a different salt (another epoch or
    /// another machine).
    pub source_password: Option<&'a [u8]>,
    /// Replace existing services instead of failing with `ImportConflict`.
    pub overwrite: bool,
}

/// Outcome of a successful import.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub added: usize,
    pub overwritten: usize,
}

/// The unlocked vault handle.  Create one with
/// `VaultStore::create_or_unlock`, then use its methods to manage
/// credentials.
pub struct VaultStore {
    /// Path to the vault file on disk.
    path: PathBuf,

    /// Parsed container (salt, canary, encrypted credentials).
    container: VaultContainer,

    /// The derived key (zeroized on drop).
    master_key: MasterKey,

    /// `false` until the first successful write of a new vault.
    persisted: bool,

    /// Iteration count for newly derived keys.
    iterations: u32,

    /// Exclusive lock held for the lifetime of the handle.
    _lock: VaultLock,
}

impl std::fmt::Debug for VaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultStore")
            .field("path", &self.path)
            .field("credentials", &self.container.credentials.len())
            .field("persisted", &self.persisted)
            .finish_non_exhaustive()
    }
}

impl VaultStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Unlock the vault at `path`, or start a new one if no file exists.
    ///
    /// For a new vault the password becomes the master password (there
    /// is nothing to verify it against).  The file is written by the
    /// first mutation, so read-only use never creates it.
    pub fn create_or_unlock(path: &Path, password: &[u8], opts: &UnlockOptions) -> Result<Self> {
        let lock = VaultLock::acquire(path, opts.lock_timeout)?;
        if path.exists() {
            Self::open_locked(path, password, opts, lock)
        } else {
            Self::create_locked(path, password, opts, lock)
        }
    }

    /// Start a brand-new vault at `path`.  Fails if a file already exists.
    pub fn create(path: &Path, password: &[u8], opts: &UnlockOptions) -> Result<Self> {
        let lock = VaultLock::acquire(path, opts.lock_timeout)?;
        if path.exists() {
            return Err(VaultError::InvalidInput(format!(
                "a vault already exists at {}",
                path.display()
            )));
        }
        Self::create_locked(path, password, opts, lock)
    }

    /// Unlock an existing vault, verifying the password.
    pub fn open(path: &Path, password: &[u8], opts: &UnlockOptions) -> Result<Self> {
        let lock = VaultLock::acquire(path, opts.lock_timeout)?;
        Self::open_locked(path, password, opts, lock)
    }

    fn create_locked(
        path: &Path,
        password: &[u8],
        opts: &UnlockOptions,
        lock: VaultLock,
    ) -> Result<Self> {
        let salt = generate_salt();
        let master_key = derive_key(password, &salt, opts.iterations)?;

        let mut container = VaultContainer::new(salt.to_vec(), opts.iterations);
        container.seal_check(&master_key)?;

        tracing::info!(path = %path.display(), "starting new vault");

        Ok(Self {
            path: path.to_path_buf(),
            container,
            master_key,
            persisted: false,
            iterations: opts.iterations,
            _lock: lock,
        })
    }

    fn open_locked(
        path: &Path,
        password: &[u8],
        opts: &UnlockOptions,
        lock: VaultLock,
    ) -> Result<Self> {
        // 1. Load and validate the container.
        let bytes = format::read_file(path)?;
        let container = VaultContainer::parse(&bytes)?;

        // 2. Derive the key with the vault's own parameters.
        let master_key = derive_key(password, &container.salt, container.iterations)?;

        // 3. Check the canary.
        container.verify_key(&master_key).map_err(|e| {
            tracing::debug!(path = %path.display(), "unlock rejected");
            e
        })?;

        tracing::debug!(
            path = %path.display(),
            credentials = container.credentials.len(),
            "vault unlocked"
        );

        Ok(Self {
            path: path.to_path_buf(),
            container,
            master_key,
            persisted: true,
            iterations: opts.iterations,
            _lock: lock,
        })
    }

    // ------------------------------------------------------------------
    // Credential operations
    // ------------------------------------------------------------------

    /// Add a new credential.  Fails with `DuplicateService` if the
    /// service is already present.
    pub fn add(&mut self, service: &str, plaintext: &str, tags: &[String]) -> Result<()> {
        self.add_with_metadata(service, plaintext, tags, BTreeMap::new())
    }

    /// Add a new credential with free-form, non-secret metadata.
    pub fn add_with_metadata(
        &mut self,
        service: &str,
        plaintext: &str,
        tags: &[String],
        metadata: BTreeMap<String, String>,
    ) -> Result<()> {
        validate_service(service)?;
        if self.container.credentials.contains_key(service) {
            return Err(VaultError::DuplicateService(service.to_string()));
        }

        let encrypted_key = encrypt(self.master_key.as_bytes(), plaintext.as_bytes())?;
        let now = Utc::now();

        let mut next = self.container.clone();
        next.credentials.insert(
            service.to_string(),
            Credential {
                service: service.to_string(),
                encrypted_key,
                tags: normalize_tags(tags),
                created_at: now,
                updated_at: now,
                metadata,
            },
        );
        self.persist(next)?;

        tracing::info!(service, "credential added");
        Ok(())
    }

    /// Decrypt and return the plaintext key for `service`.
    ///
    /// The returned string is wiped from memory when dropped.
    pub fn get(&self, service: &str) -> Result<Zeroizing<String>> {
        let cred = self.credential(service)?;

        let mut plaintext = decrypt(self.master_key.as_bytes(), &cred.encrypted_key).map_err(|e| {
            tracing::debug!(service, "credential failed authentication");
            e
        })?;

        // Move the bytes out of the zeroizing buffer without copying.
        // On error, zeroize the bytes inside the error before discarding.
        String::from_utf8(std::mem::take(&mut *plaintext))
            .map(Zeroizing::new)
            .map_err(|e| {
                let mut bad_bytes = e.into_bytes();
                bad_bytes.zeroize();
                VaultError::CorruptData(format!("credential '{service}' is not valid UTF-8"))
            })
    }

    /// Metadata for one credential, without decrypting anything.
    pub fn metadata(&self, service: &str) -> Result<CredentialMetadata> {
        Ok(self.credential(service)?.to_metadata())
    }

    /// Change a credential's key and/or tags.
    ///
    /// Tags, when given, replace the existing set.  `updated` is bumped
    /// even when neither is given.
    pub fn update(
        &mut self,
        service: &str,
        plaintext: Option<&str>,
        tags: Option<&[String]>,
    ) -> Result<()> {
        let existing = self.credential(service)?;
        let mut updated = existing.clone();

        if let Some(p) = plaintext {
            updated.encrypted_key = encrypt(self.master_key.as_bytes(), p.as_bytes())?;
        }
        if let Some(t) = tags {
            updated.tags = normalize_tags(t);
        }
        updated.updated_at = next_timestamp(existing.updated_at);

        let mut next = self.container.clone();
        next.credentials.insert(service.to_string(), updated);
        self.persist(next)?;

        tracing::info!(
            service,
            key_changed = plaintext.is_some(),
            tags_changed = tags.is_some(),
            "credential updated"
        );
        Ok(())
    }

    /// Remove a credential.  Confirmation is the caller's business.
    pub fn delete(&mut self, service: &str) -> Result<()> {
        self.credential(service)?;

        let mut next = self.container.clone();
        next.credentials.remove(service);
        self.persist(next)?;

        tracing::info!(service, "credential deleted");
        Ok(())
    }

    /// Returns `true` if the vault contains `service`.
    ///
    /// This is a metadata-only check; no decryption is performed.
    pub fn contains(&self, service: &str) -> bool {
        self.container.credentials.contains_key(service)
    }

    /// List metadata for all credentials (optionally only those carrying
    /// `tag`), sorted by service.  Never decrypts.
    pub fn list(&self, tag: Option<&str>) -> Vec<CredentialMetadata> {
        self.container
            .credentials
            .values()
            .filter(|c| tag.map_or(true, |t| c.has_tag(t)))
            .map(Credential::to_metadata)
            .collect()
    }

    /// Case-insensitive substring search over service names and tags.
    pub fn search(&self, query: &str) -> Result<Vec<CredentialMetadata>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(VaultError::InvalidInput("search query cannot be empty".into()));
        }

        Ok(self
            .container
            .credentials
            .values()
            .filter(|c| {
                c.service.to_lowercase().contains(&needle)
                    || c.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .map(Credential::to_metadata)
            .collect())
    }

    // ------------------------------------------------------------------
    // Password rotation
    // ------------------------------------------------------------------

    /// Change the master password.
    ///
    /// Verifies `old`, generates a fresh salt, derives the new key and
    /// re-encrypts every credential into a new container.  The new
    /// container is written in one atomic step; on any failure the vault
    /// on disk and this handle are left exactly as they were.
    pub fn change_password(&mut self, old: &[u8], new: &[u8]) -> Result<()> {
        let old_key = derive_key(old, &self.container.salt, self.container.iterations)?;
        if !old_key.matches(&self.master_key) {
            tracing::debug!("current password did not match the unlocked key");
            return Err(VaultError::AuthenticationFailed);
        }

        let new_salt = generate_salt();
        let new_key = derive_key(new, &new_salt, self.iterations)?;

        let mut next = VaultContainer::new(new_salt.to_vec(), self.iterations);
        for (service, cred) in &self.container.credentials {
            let plaintext = decrypt(self.master_key.as_bytes(), &cred.encrypted_key)?;
            let encrypted_key = encrypt(new_key.as_bytes(), &plaintext)?;
            drop(plaintext);

            next.credentials.insert(
                service.clone(),
                Credential {
                    encrypted_key,
                    ..cred.clone()
                },
            );
        }
        next.seal_check(&new_key)?;

        self.persist(next)?;
        self.master_key = new_key;

        tracing::info!(
            credentials = self.container.credentials.len(),
            "master password changed"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Export / import / backup
    // ------------------------------------------------------------------

    /// Write the vault to `target` for transfer.
    ///
    /// With `export_password` the whole container is additionally
    /// encrypted under a key derived from that password.
    pub fn export(&self, target: &Path, export_password: Option<&[u8]>) -> Result<()> {
        if same_file(target, &self.path) {
            return Err(VaultError::InvalidInput(
                "refusing to export over the live vault file".into(),
            ));
        }

        export::write_export(&self.container, target, export_password, self.iterations)?;

        tracing::info!(
            target = %target.display(),
            credentials = self.container.credentials.len(),
            wrapped = export_password.is_some(),
            "vault exported"
        );
        Ok(())
    }

    /// Merge credentials from an export (or a raw vault/backup file).
    ///
    /// All-or-nothing: any service collision without `overwrite` fails
    /// the whole import with `ImportConflict`.
    pub fn import(&mut self, source: &Path, opts: &ImportOptions<'_>) -> Result<ImportSummary> {
        let incoming = export::read_export(source, opts.export_password)?;

        let conflicts: Vec<String> = incoming
            .credentials
            .keys()
            .filter(|s| self.container.credentials.contains_key(*s))
            .cloned()
            .collect();
        if !conflicts.is_empty() && !opts.overwrite {
            return Err(VaultError::ImportConflict(conflicts));
        }

        // Reuse our key when the export comes from this same epoch.
        let derived;
        let source_key = if incoming.salt == self.container.salt
            && incoming.iterations == self.container.iterations
            && incoming.verify_key(&self.master_key).is_ok()
        {
            &self.master_key
        } else {
            let password = opts.source_password.ok_or_else(|| {
                VaultError::InvalidInput(
                    "the export was written under a different master password; \
                     its password is required"
                        .into(),
                )
            })?;
            derived = derive_key(password, &incoming.salt, incoming.iterations)?;
            incoming.verify_key(&derived)?;
            &derived
        };

        let mut next = self.container.clone();
        let mut summary = ImportSummary::default();
        for (service, cred) in incoming.credentials {
            let plaintext = decrypt(source_key.as_bytes(), &cred.encrypted_key)?;
            let encrypted_key = encrypt(self.master_key.as_bytes(), &plaintext)?;
            drop(plaintext);

            let replaced = next.credentials.insert(
                service,
                Credential {
                    encrypted_key,
                    tags: normalize_tags(&cred.tags),
                    ..cred
                },
            );
            if replaced.is_some() {
                summary.overwritten += 1;
            } else {
                summary.added += 1;
            }
        }

        self.persist(next)?;

        tracing::info!(
            source = %source.display(),
            added = summary.added,
            overwritten = summary.overwritten,
            "credentials imported"
        );
        Ok(summary)
    }

    /// Copy the persisted vault bytes into `backup_dir`.
    ///
    /// `max_backups` of 0 keeps every backup; otherwise the oldest are
    /// pruned after the new one is written.
    pub fn backup(&self, backup_dir: &Path, max_backups: usize) -> Result<BackupInfo> {
        if !self.persisted {
            return Err(VaultError::VaultNotFound(self.path.clone()));
        }
        let info = backup::create_backup(&self.path, backup_dir)?;
        if max_backups > 0 {
            backup::prune_backups(backup_dir, max_backups)?;
        }
        Ok(info)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Serialize `next`, write it atomically, then adopt it.
    fn persist(&mut self, next: VaultContainer) -> Result<()> {
        let bytes = next.serialize()?;
        format::write_atomic(&self.path, &bytes)?;
        self.container = next;
        self.persisted = true;
        Ok(())
    }

    fn credential(&self, service: &str) -> Result<&Credential> {
        self.container
            .credentials
            .get(service)
            .ok_or_else(|| VaultError::NotFound(service.to_string()))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Returns the path to the vault file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of credentials in the vault.
    pub fn credential_count(&self) -> usize {
        self.container.credentials.len()
    }

    /// `true` if this vault has not been written to disk yet.
    pub fn is_new(&self) -> bool {
        !self.persisted
    }

    /// Read-only view of the container.
    pub fn container(&self) -> &VaultContainer {
        &self.container
    }
}

/// Current time, but never earlier than `previous`.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous)
}

/// Best-effort "do these two paths name the same file".
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
