use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use tally::cli::{self, Command};
use tally::config::Config;
use tally::{CounterStore, db};

fn main() -> Result<()> {
    init_tracing();

    let cli_opts = cli::Cli::parse();
    let config = Config::load()?;
    let db_path = cli_opts.db.clone().unwrap_or_else(|| config.db_path());
    let slot = db::init(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "database opened");

    let mut store = CounterStore::open(slot, config.store_settings());
    let command = cli_opts.command.unwrap_or(Command::List {
        category: None,
        all: false,
        archived: false,
    });
    cli::run(command, &mut store)
}

/// Logs go to stderr so command output stays clean. `TALLY_LOG` takes the
/// usual filter syntax, e.g. `TALLY_LOG=tally=debug`.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
