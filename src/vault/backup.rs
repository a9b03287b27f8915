//! Timestamped backups of the persisted vault file.
//!
//! A backup is a byte-for-byte copy of the vault file; it is already
//! encrypted, so nothing is re-encrypted.  Restore validates the backup
//! parses under the current format, snapshots the live vault, and then
//! atomically replaces it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use super::format::{read_file, write_atomic, VaultContainer};
use super::lock::VaultLock;
use crate::crypto::kdf::derive_key;
use crate::errors::{Result, VaultError};

/// File name prefix for backups.
const BACKUP_PREFIX: &str = "vault-";

/// File name suffix for backups.
const BACKUP_SUFFIX: &str = ".json";

/// Timestamp layout inside backup names (UTC, millisecond precision).
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3f";

/// A backup file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub created: DateTime<Utc>,
}

/// Whether the restored vault opens with the password the caller gave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    Matches,
    /// The backup belongs to another password epoch.
    Mismatch,
    NotChecked,
}

/// Outcome of a restore.
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub restored_from: PathBuf,
    pub credential_count: usize,
    pub password: PasswordCheck,
    /// Copy of the vault that was replaced, if there was one.
    pub previous: Option<BackupInfo>,
}

/// Default backup directory: `backups/` next to the vault file.
pub fn default_backup_dir(vault_path: &Path) -> PathBuf {
    vault_path
        .parent()
        .unwrap_or(Path::new("."))
        .join("backups")
}

/// Copy the vault file at `vault_path` into `backup_dir`.
///
/// The caller must hold the vault lock.
pub fn create_backup(vault_path: &Path, backup_dir: &Path) -> Result<BackupInfo> {
    let bytes = read_file(vault_path)?;

    let now = Utc::now();
    let stamp = now.format(STAMP_FORMAT).to_string();
    let mut name = format!("{BACKUP_PREFIX}{stamp}Z{BACKUP_SUFFIX}");
    let mut n = 1;
    while backup_dir.join(&name).exists() {
        name = format!("{BACKUP_PREFIX}{stamp}Z-{n}{BACKUP_SUFFIX}");
        n += 1;
    }

    let path = backup_dir.join(&name);
    write_atomic(&path, &bytes)?;

    tracing::info!(backup = %path.display(), bytes = bytes.len(), "backup written");

    Ok(BackupInfo {
        name,
        path,
        size: bytes.len() as u64,
        created: now,
    })
}

/// List backups in `backup_dir`, newest first.  A missing directory
/// simply has no backups.
pub fn list_backups(backup_dir: &Path) -> Result<Vec<BackupInfo>> {
    let entries = match fs::read_dir(backup_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(VaultError::io(backup_dir, e)),
    };

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| VaultError::io(backup_dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(BACKUP_PREFIX) || !name.ends_with(BACKUP_SUFFIX) {
            continue;
        }
        let meta = entry.metadata().map_err(|e| VaultError::io(entry.path(), e))?;
        if !meta.is_file() {
            continue;
        }

        let created = parse_stamp(&name)
            .or_else(|| meta.modified().ok().map(DateTime::<Utc>::from))
            .unwrap_or_else(Utc::now);

        backups.push(BackupInfo {
            name,
            path: entry.path(),
            size: meta.len(),
            created,
        });
    }

    backups.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.name.cmp(&a.name)));
    Ok(backups)
}

/// Delete all but the `keep` newest backups.  Returns how many were removed.
pub fn prune_backups(backup_dir: &Path, keep: usize) -> Result<usize> {
    let backups = list_backups(backup_dir)?;
    let mut removed = 0;
    for old in backups.iter().skip(keep) {
        fs::remove_file(&old.path).map_err(|e| VaultError::io(&old.path, e))?;
        removed += 1;
    }
    if removed > 0 {
        tracing::debug!(removed, keep, "pruned old backups");
    }
    Ok(removed)
}

/// Replace the vault at `vault_path` with a backup.
///
/// `backup` is a file name inside `backup_dir` or a path to any backup
/// file.  Does not need the master password; when `password` is given,
/// the restored vault is test-unlocked and the result reported (a
/// mismatch is not an error).
pub fn restore(
    vault_path: &Path,
    backup_dir: &Path,
    backup: &str,
    password: Option<&[u8]>,
    lock_timeout: Duration,
) -> Result<RestoreReport> {
    let source = resolve_backup(backup_dir, backup)?;
    let bytes = read_file(&source)?;
    let container = VaultContainer::parse(&bytes)?;

    let previous = {
        let _lock = VaultLock::acquire(vault_path, lock_timeout)?;
        let previous = if vault_path.exists() {
            Some(create_backup(vault_path, backup_dir)?)
        } else {
            None
        };
        write_atomic(vault_path, &bytes)?;
        previous
    };

    let password = match password {
        Some(pw) => {
            let key = derive_key(pw, &container.salt, container.iterations)?;
            match container.verify_key(&key) {
                Ok(()) => PasswordCheck::Matches,
                Err(VaultError::AuthenticationFailed) => PasswordCheck::Mismatch,
                Err(e) => return Err(e),
            }
        }
        None => PasswordCheck::NotChecked,
    };

    tracing::info!(
        from = %source.display(),
        credentials = container.credentials.len(),
        ?password,
        "vault restored"
    );

    Ok(RestoreReport {
        restored_from: source,
        credential_count: container.credentials.len(),
        password,
        previous,
    })
}

/// Listed backup names win over same-named files in the working directory.
fn resolve_backup(backup_dir: &Path, backup: &str) -> Result<PathBuf> {
    let in_dir = backup_dir.join(backup);
    if in_dir.is_file() {
        return Ok(in_dir);
    }
    let direct = Path::new(backup);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }
    Err(VaultError::VaultNotFound(in_dir))
}

/// Parse the timestamp out of `vault-YYYYMMDDTHHMMSSmmmZ[-n].json`.
fn parse_stamp(name: &str) -> Option<DateTime<Utc>> {
    let core = name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_SUFFIX)?;
    let stamp = core.split('Z').next()?;
    let (date, time) = stamp.split_once('T')?;
    let all_digits = date.bytes().chain(time.bytes()).all(|b| b.is_ascii_digit());
    if date.len() != 8 || time.len() != 9 || !all_digits {
        return None;
    }

    let num = |s: &str| s.parse::<u32>().ok();
    let day = NaiveDate::from_ymd_opt(
        date[0..4].parse().ok()?,
        num(&date[4..6])?,
        num(&date[6..8])?,
    )?;
    let dt = day.and_hms_milli_opt(
        num(&time[0..2])?,
        num(&time[2..4])?,
        num(&time[4..6])?,
        num(&time[6..9])?,
    )?;
    Some(dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_stamp_roundtrips_generated_names() {
        let now = Utc::now();
        let name = format!(
            "{BACKUP_PREFIX}{}Z{BACKUP_SUFFIX}",
            now.format(STAMP_FORMAT)
        );
        let parsed = parse_stamp(&name).unwrap();
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());

        let dup = format!(
            "{BACKUP_PREFIX}{}Z-2{BACKUP_SUFFIX}",
            now.format(STAMP_FORMAT)
        );
        assert!(parse_stamp(&dup).is_some());
    }

    #[test]
    fn list_backups_on_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(list_backups(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn list_ignores_unrelated_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
        fs::write(dir.path().join("vault-20240101T000000000Z.json"), b"{}").unwrap();
        let list = list_backups(dir.path()).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "vault-20240101T000000000Z.json");
    }

    #[test]
    fn prune_keeps_newest() {
        let dir = TempDir::new().unwrap();
        for stamp in ["20240101T000000000", "20240102T000000000", "20240103T000000000"] {
            fs::write(dir.path().join(format!("vault-{stamp}Z.json")), b"{}").unwrap();
        }
        assert_eq!(prune_backups(dir.path(), 1).unwrap(), 2);
        let left = list_backups(dir.path()).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "vault-20240103T000000000Z.json");
    }

    #[test]
    fn resolve_prefers_the_backup_dir_over_the_working_directory() {
        let dir = TempDir::new().unwrap();
        let backups = dir.path().join("backups");
        fs::create_dir(&backups).unwrap();

        // Tests run from the package root, where Cargo.toml exists too.
        assert!(Path::new("Cargo.toml").is_file());
        fs::write(backups.join("Cargo.toml"), b"{}").unwrap();
        assert_eq!(
            resolve_backup(&backups, "Cargo.toml").unwrap(),
            backups.join("Cargo.toml")
        );

        // Paths that are not in the backup dir still resolve directly.
        let outside = dir.path().join("vault-20240101T000000000Z.json");
        fs::write(&outside, b"{}").unwrap();
        let outside_str = outside.to_string_lossy().into_owned();
        assert_eq!(resolve_backup(&backups, &outside_str).unwrap(), outside);

        assert!(matches!(
            resolve_backup(&backups, "vault-missing.json"),
            Err(VaultError::VaultNotFound(_))
        ));
    }

    #[test]
    fn default_backup_dir_is_sibling() {
        assert_eq!(
            default_backup_dir(Path::new("/home/u/.clawvault/vault.json")),
            PathBuf::from("/home/u/.clawvault/backups")
        );
    }
}
