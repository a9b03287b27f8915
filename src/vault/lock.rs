//! Exclusive advisory lock guarding load-mutate-persist cycles.
//!
//! The lock lives on a sibling `<vault>.lock` file rather than the vault
//! itself: every save renames a new inode over the vault path, which
//! would silently detach a lock held on the old one.
//!
//! Acquisition is non-blocking with a bounded retry loop, so a stuck
//! peer produces `VaultLocked` instead of a hang.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::format::ensure_private_dir;
use crate::errors::{Result, VaultError};

/// Delay between acquisition attempts.
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Default time to wait for a competing process.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Held for as long as the guard lives; released on drop.
#[derive(Debug)]
pub struct VaultLock {
    file: File,
    path: PathBuf,
}

impl VaultLock {
    /// Path of the lock file protecting `vault_path`.
    pub fn lock_path(vault_path: &Path) -> PathBuf {
        let mut name = vault_path
            .file_name()
            .unwrap_or_default()
            .to_os_string();
        name.push(".lock");
        vault_path.with_file_name(name)
    }

    /// Acquire the exclusive lock for `vault_path`, waiting up to `timeout`.
    pub fn acquire(vault_path: &Path, timeout: Duration) -> Result<Self> {
        let path = Self::lock_path(vault_path);
        if let Some(parent) = path.parent() {
            ensure_private_dir(parent)?;
        }

        let mut opts = OpenOptions::new();
        opts.read(true).write(true).create(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let file = opts.open(&path).map_err(|e| VaultError::io(&path, e))?;

        let deadline = Instant::now() + timeout;
        loop {
            match try_lock(&file) {
                Ok(true) => break,
                Ok(false) if Instant::now() < deadline => thread::sleep(RETRY_INTERVAL),
                Ok(false) => {
                    tracing::warn!(path = %vault_path.display(), "timed out waiting for vault lock");
                    return Err(VaultError::VaultLocked(vault_path.to_path_buf()));
                }
                Err(e) => return Err(VaultError::io(&path, e)),
            }
        }

        tracing::debug!(path = %path.display(), "vault lock acquired");
        Ok(Self { file, path })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        unlock(&self.file);
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> std::io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and valid for this call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.kind() == std::io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    // SAFETY: see `try_lock`.  Closing the file would release it anyway.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

// TODO: use LockFileEx on Windows; until then the temp-file rename is the only guard.
#[cfg(not(unix))]
fn try_lock(_file: &File) -> std::io::Result<bool> {
    Ok(true)
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}
