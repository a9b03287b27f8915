use clap::Parser;
use clawvault::cli::commands;
use clawvault::cli::{output, Cli, Commands};
use tracing_subscriber::EnvFilter;

/// Environment variable controlling log verbosity (e.g. `debug`).
const LOG_ENV: &str = "CLAWVAULT_LOG";

fn main() {
    init_tracing("warn");

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Add {
            ref service,
            ref key,
            ref tags,
        } => commands::add::execute(&cli, service, key.as_deref(), tags),
        Commands::Get { ref service, copy } => commands::get::execute(&cli, service, copy),
        Commands::List { ref tag, verbose } => {
            commands::list::execute(&cli, tag.as_deref(), verbose)
        }
        Commands::Search { ref query } => commands::search::execute(&cli, query),
        Commands::Update {
            ref service,
            ref key,
            ref tags,
        } => commands::update::execute(&cli, service, key.as_deref(), tags),
        Commands::Delete { ref service, force } => {
            commands::delete::execute(&cli, service, force)
        }
        Commands::Export {
            ref output,
            encrypt,
        } => commands::export::execute(&cli, output, encrypt),
        Commands::Import {
            ref input,
            decrypt,
            overwrite,
            source_password,
        } => commands::import_cmd::execute(&cli, input, decrypt, overwrite, source_password),
        Commands::Passwd => commands::passwd::execute(&cli),
        Commands::Backup => commands::backup::execute(&cli),
        Commands::Backups => commands::backups::execute(&cli),
        Commands::Restore {
            ref backup,
            no_verify,
        } => commands::restore::execute(&cli, backup, no_verify),
        Commands::Audit { last, ref since } => audit(&cli, last, since.as_deref()),
        Commands::Completions { ref shell } => commands::completions::execute(shell),
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

#[cfg(feature = "audit-log")]
fn audit(cli: &Cli, last: usize, since: Option<&str>) -> clawvault::errors::Result<()> {
    commands::audit_cmd::execute(cli, last, since)
}

#[cfg(not(feature = "audit-log"))]
fn audit(_cli: &Cli, _last: usize, _since: Option<&str>) -> clawvault::errors::Result<()> {
    Err(clawvault::errors::VaultError::CommandFailed(
        "this build has no audit log (rebuild with the `audit-log` feature)".into(),
    ))
}

/// Log to stderr, filtered by `CLAWVAULT_LOG` (default: `warn`).
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
