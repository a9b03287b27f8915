//! `clawvault audit`: display the audit log.
//!
//! Usage:
//!   clawvault audit               # show last 50 entries
//!   clawvault audit --last 20     # show last 20
//!   clawvault audit --since 7d    # entries from last 7 days

use chrono::Utc;

use crate::audit::{AuditEntry, AuditLog};
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultError};

/// Execute the `audit` command.  Needs no password; entries hold no secrets.
pub fn execute(cli: &Cli, last: usize, since: Option<&str>) -> Result<()> {
    let ctx = Context::load(cli)?;
    let since = since.map(parse_duration).transpose()?;
    let vault_dir = ctx
        .vault_path
        .parent()
        .map(std::path::Path::to_path_buf)
        .unwrap_or_default();

    if !AuditLog::db_path(&vault_dir).exists() {
        output::info("No audit entries found.");
        return Ok(());
    }

    let audit = AuditLog::open(&vault_dir)
        .ok_or_else(|| VaultError::AuditError("failed to open audit database".into()))?;

    let entries = audit.query(last, since)?;

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    print_audit_table(&entries);

    Ok(())
}

/// Parse a relative time like "7d", "24h", "30m" into an absolute cutoff.
fn parse_duration(input: &str) -> Result<chrono::DateTime<Utc>> {
    let input = input.trim();
    let invalid = || {
        VaultError::InvalidInput(format!(
            "invalid duration '{input}' (use a form like 7d, 24h or 30m)"
        ))
    };

    let (split, _) = input.char_indices().last().ok_or_else(invalid)?;
    let (num, unit) = input.split_at(split);
    let num: i64 = num.parse().map_err(|_| invalid())?;
    if num < 0 {
        return Err(invalid());
    }

    let duration = match unit {
        "d" => chrono::Duration::days(num),
        "h" => chrono::Duration::hours(num),
        "m" => chrono::Duration::minutes(num),
        _ => return Err(invalid()),
    };

    Ok(Utc::now() - duration)
}

/// Print audit entries in a formatted table.
pub fn print_audit_table(entries: &[AuditEntry]) {
    use comfy_table::{ContentArrangement, Table};
    use console::style;

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Operation", "Service", "Details"]);

    for entry in entries {
        let time = entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        let op = colorize_operation(&entry.operation);
        let service = entry.service.as_deref().unwrap_or("-");
        let details = entry.details.as_deref().unwrap_or("-");

        table.add_row(vec![time, op, service.to_string(), details.to_string()]);
    }

    println!(
        "{}",
        style(format!("{} audit entries:", entries.len())).bold()
    );
    println!("{table}");
}

/// Colorize operation names for display.
fn colorize_operation(op: &str) -> String {
    use console::style;

    match op {
        "add" => style(op).green().to_string(),
        "update" => style(op).blue().to_string(),
        "delete" => style(op).red().to_string(),
        "passwd" | "restore" => style(op).yellow().to_string(),
        "export" | "import" => style(op).cyan().to_string(),
        "backup" => style(op).magenta().to_string(),
        _ => op.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_days() {
        let dt = parse_duration("7d").unwrap();
        let diff = Utc::now() - dt;
        // Should be roughly 7 days (within a few seconds).
        assert!((diff.num_days() - 7).abs() <= 1);
    }

    #[test]
    fn parse_duration_hours() {
        let dt = parse_duration("24h").unwrap();
        let diff = Utc::now() - dt;
        assert!((diff.num_hours() - 24).abs() <= 1);
    }

    #[test]
    fn parse_duration_minutes() {
        let dt = parse_duration("30m").unwrap();
        let diff = Utc::now() - dt;
        assert!((diff.num_minutes() - 30).abs() <= 1);
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("7x").is_err());
        assert!(parse_duration("d").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-3d").is_err());
    }

    #[test]
    fn colorize_operation_returns_string() {
        // Just verify it doesn't panic for known and unknown operations.
        assert!(!colorize_operation("add").is_empty());
        assert!(!colorize_operation("passwd").is_empty());
        assert!(!colorize_operation("unknown").is_empty());
    }

    #[test]
    fn audit_query_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();

        audit.log("add", Some("github"), Some("tags: dev"));
        audit.log("delete", Some("stripe"), None);

        let entries = audit.query(10, None).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn audit_with_since_filter() {
        let dir = tempfile::TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();

        audit.log("update", Some("github"), Some("key"));

        // Query with "1h" should include recent entries.
        let since = parse_duration("1h").unwrap();
        let entries = audit.query(10, Some(since)).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn audit_empty_returns_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();
        let entries = audit.query(10, None).unwrap();
        assert!(entries.is_empty());
    }
}
