//! Binary entry point: resolve configuration, bring up logging and the SQLite
//! store, seed it, then either answer a single CLI request or run the TUI.
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use choir_instrument_ledger::cli::{dispatch, Cli, Command};
use choir_instrument_ledger::config::Config;
use choir_instrument_ledger::{logging, run_app, App, Ledger, SqliteStore};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    logging::init(&config)?;

    let mut store = SqliteStore::open(&config.database)?;
    let (choristers, instruments) = store.seed(&config.instruments, &config.choristers)?;
    info!(
        database = %config.database.display(),
        choristers,
        instruments,
        "ledger store ready"
    );

    let mut ledger = Ledger::new(store);

    match cli.command.unwrap_or(Command::Tui) {
        Command::Tui => {
            let mut app = App::new(ledger)?;
            run_app(&mut app)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Import { legacy_db } => {
            let report = ledger.store_mut().import_legacy(&legacy_db)?;
            println!(
                "Imported {} choristers and {} logs ({} already present).",
                report.choristers, report.logs, report.skipped
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Request(request) => {
            let reply = dispatch(&mut ledger, request);
            if reply.is_success() {
                println!("{}", serde_json::to_string_pretty(&reply.body)?);
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("{}", reply.body);
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
