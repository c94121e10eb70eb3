//! Persistence module split across logical submodules.

mod connection;
mod import;
mod seed;
mod sqlite;
mod store;

pub use connection::{ensure_schema, open, open_in_memory};
pub use import::{import_legacy, ImportReport};
pub use seed::{reconcile_availability, reseed_instruments, seed_choristers};
pub use sqlite::SqliteStore;
pub use store::{LoanStore, LoanTx};
