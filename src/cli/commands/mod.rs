//! One module per subcommand.  Each exposes an `execute` function that
//! `main` dispatches to.

pub mod add;
#[cfg(feature = "audit-log")]
pub mod audit_cmd;
pub mod backup;
pub mod backups;
pub mod completions;
pub mod delete;
pub mod export;
pub mod get;
pub mod import_cmd;
pub mod list;
pub mod passwd;
pub mod restore;
pub mod search;
pub mod update;
