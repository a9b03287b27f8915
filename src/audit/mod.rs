//! Audit log: SQLite-based operation history.
//!
//! Records every mutating vault command (add, update, delete, import,
//! passwd, restore, ...) in `<vault_dir>/audit.db`.  Entries carry the
//! operation, the affected service and a short detail string; never a
//! secret value.
//!
//! Designed for graceful degradation: if the database can't be opened or
//! written to, operations silently continue without logging.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::errors::{Result, VaultError};

/// File name of the audit database inside the vault directory.
const DB_FILE: &str = "audit.db";

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub service: Option<String>,
    pub details: Option<String>,
}

/// SQLite-backed audit log.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `<vault_dir>/audit.db`.
    ///
    /// Returns `None` if the database can't be opened; callers treat
    /// this as "audit logging unavailable" and continue normally.
    pub fn open(vault_dir: &Path) -> Option<Self> {
        let db_path = Self::db_path(vault_dir);
        let conn = match Connection::open(&db_path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(path = %db_path.display(), error = %e, "audit log unavailable");
                return None;
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                operation   TEXT NOT NULL,
                service     TEXT,
                details     TEXT
            );",
        )
        .ok()?;

        Some(Self { conn })
    }

    /// Record an operation. Fire-and-forget; errors are ignored.
    pub fn log(&self, operation: &str, service: Option<&str>, details: Option<&str>) {
        let now = Utc::now().to_rfc3339();
        let _ = self.conn.execute(
            "INSERT INTO audit_log (timestamp, operation, service, details)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![now, operation, service, details],
        );
    }

    /// Query recent audit entries, most recent first.
    ///
    /// - `limit`: maximum number of entries to return.
    /// - `since`: if provided, only return entries at or after this time.
    pub fn query(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<AuditEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        // RFC 3339 strings from `Utc::to_rfc3339` sort chronologically.
        let since = since
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_default();

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, operation, service, details
                 FROM audit_log
                 WHERE timestamp >= ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| VaultError::AuditError(format!("query prepare: {e}")))?;

        let rows = stmt
            .query_map(rusqlite::params![since, limit], |row| {
                let ts: String = row.get(1)?;
                let timestamp = DateTime::parse_from_rfc3339(&ts)
                    .map_or_else(|_| DateTime::<Utc>::UNIX_EPOCH, |dt| dt.with_timezone(&Utc));

                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp,
                    operation: row.get(2)?,
                    service: row.get(3)?,
                    details: row.get(4)?,
                })
            })
            .map_err(|e| VaultError::AuditError(format!("query exec: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VaultError::AuditError(format!("row parse: {e}")))
    }

    /// Path of the audit database for a vault directory.
    pub fn db_path(vault_dir: &Path) -> PathBuf {
        vault_dir.join(DB_FILE)
    }
}

/// Log an audit event next to the vault at `vault_path`.
///
/// Never fails the calling command.
pub fn log_audit(vault_path: &Path, op: &str, service: Option<&str>, details: Option<&str>) {
    let Some(dir) = vault_path.parent() else {
        return;
    };
    if let Some(audit) = AuditLog::open(dir) {
        audit.log(op, service, details);
    }
}
