//! Core library surface for the choir instrument ledger.
//!
//! The ledger itself lives in [`ledger`]; everything else is either the
//! storage it is written against ([`db`]) or a front end that calls into it
//! ([`cli`], [`ui`]).
pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod ui;

/// Convenience re-exports for the persistence layer.
pub use db::{LoanStore, LoanTx, SqliteStore};

pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use models::{Chorister, Instrument, LoanRecord, NewLoan};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
