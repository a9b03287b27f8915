//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::vault::{BackupInfo, CredentialMetadata};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print one bullet per service.
pub fn print_service_list(credentials: &[CredentialMetadata]) {
    for c in credentials {
        println!("  \u{2022} {}", c.service);
    }
}

/// Print a table of credential metadata (Service, Tags, Created, Updated).
pub fn print_credentials_table(credentials: &[CredentialMetadata]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Service", "Tags", "Created", "Updated"]);

    for c in credentials {
        let tags = if c.tags.is_empty() {
            "-".to_string()
        } else {
            c.tags.join(", ")
        };
        table.add_row(vec![
            c.service.clone(),
            tags,
            c.created_at.format(TIME_FORMAT).to_string(),
            c.updated_at.format(TIME_FORMAT).to_string(),
        ]);
    }

    println!("{table}");
}

/// Print a table of backups, newest first.
pub fn print_backups_table(backups: &[BackupInfo]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Backup", "Size", "Created"]);

    for b in backups {
        table.add_row(vec![
            b.name.clone(),
            format_size(b.size),
            b.created.format(TIME_FORMAT).to_string(),
        ]);
    }

    println!("{table}");
}

/// Human-readable file size.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}
