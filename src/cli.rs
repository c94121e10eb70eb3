//! Command-line front end. Each ledger request prints the same JSON payloads
//! the old web endpoints returned, so shell scripts can drive the ledger
//! without the terminal UI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};

use crate::db::LoanStore;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::models::NewLoan;

#[derive(Debug, Parser)]
#[command(name = "instrument-ledger", version, about = "Track choir instrument loans")]
pub struct Cli {
    /// Path to a config.toml (defaults to the one in the data directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database to use instead of the configured one.
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the interactive terminal UI (the default).
    Tui,
    /// Copy choristers and logs from a database written by the web version.
    Import { legacy_db: PathBuf },
    #[command(flatten)]
    Request(Request),
}

/// Requests answered with a JSON reply.
#[derive(Debug, Subcommand)]
pub enum Request {
    /// List available instrument numbers of a type.
    Available { instrument_type: String },
    /// Sign an instrument out to a chorister.
    Checkout(CheckoutArgs),
    /// Sign an instrument back in.
    Checkin {
        instrument_number: String,
        #[arg(long)]
        condition: Option<String>,
    },
    /// Show loan history, newest first.
    History {
        #[arg(long, short)]
        search: Option<String>,
    },
    /// List chorister divisions.
    Divisions,
    /// List choristers in a division.
    Choristers { division: String },
    /// List instrument types.
    Types,
}

#[derive(Debug, Args)]
pub struct CheckoutArgs {
    #[arg(long)]
    pub division: String,
    #[arg(long)]
    pub group: Option<String>,
    #[arg(long = "name")]
    pub chorister_name: String,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long = "type")]
    pub instrument_type: String,
    #[arg(long = "number")]
    pub instrument_number: String,
}

impl From<CheckoutArgs> for NewLoan {
    fn from(args: CheckoutArgs) -> Self {
        NewLoan {
            division: args.division,
            group: args.group,
            chorister_name: args.chorister_name,
            phone: args.phone,
            instrument_type: args.instrument_type,
            instrument_number: args.instrument_number,
        }
    }
}

/// Status plus JSON body, mirroring an HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(err: &LedgerError) -> Self {
        Self {
            status: err.status(),
            body: json!({ "error": err.to_string(), "status": err.status() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

pub fn dispatch<S: LoanStore>(ledger: &mut Ledger<S>, request: Request) -> Reply {
    let outcome = match request {
        Request::Available { instrument_type } => ledger
            .list_available(&instrument_type)
            .map(|numbers| json!(numbers)),
        Request::Checkout(args) => ledger
            .checkout(args.into())
            .map(|_| json!({ "success": true })),
        Request::Checkin {
            instrument_number,
            condition,
        } => ledger
            .checkin(&instrument_number, condition.as_deref())
            .map(|_| json!({ "success": true })),
        Request::History { search } => ledger
            .history(search.as_deref())
            .map(|records| json!(records)),
        Request::Divisions => ledger.divisions().map(|d| json!(d)),
        Request::Choristers { division } => ledger.choristers(&division).map(|c| json!(c)),
        Request::Types => ledger.instrument_types().map(|t| json!(t)),
    };

    match outcome {
        Ok(body) => Reply::ok(body),
        Err(err) => Reply::error(&err),
    }
}
