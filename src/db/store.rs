//! The storage port the ledger is written against. Read-only queries live on
//! [`LoanStore`]; anything that must observe and change the instrument/log
//! pair together goes through [`LoanStore::transaction`], whose [`LoanTx`]
//! handle is only valid inside the closure.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::error::LedgerResult;
use crate::models::{Chorister, Instrument, LoanRecord, NewLoan};

pub trait LoanStore {
    /// Distinct instrument types in catalog order.
    fn instrument_types(&self) -> Result<Vec<String>>;

    /// Numbers of available instruments of `kind`, in catalog order.
    fn available_numbers(&self, kind: &str) -> Result<Vec<String>>;

    /// Loan history, newest first, optionally narrowed by a case-insensitive
    /// substring match on division, chorister, instrument type or number.
    fn history(&self, search: Option<&str>) -> Result<Vec<LoanRecord>>;

    /// Open loans, newest first.
    fn open_loans(&self) -> Result<Vec<LoanRecord>>;

    fn divisions(&self) -> Result<Vec<String>>;

    /// Choristers of `division`, by name.
    fn choristers(&self, division: &str) -> Result<Vec<Chorister>>;

    /// Run `work` inside one serialized write transaction. The transaction
    /// commits when `work` returns `Ok` and rolls back otherwise.
    fn transaction<T, F>(&mut self, work: F) -> LedgerResult<T>
    where
        F: FnOnce(&dyn LoanTx) -> LedgerResult<T>;
}

/// Operations available while a transaction is open.
pub trait LoanTx {
    fn instrument(&self, number: &str) -> Result<Option<Instrument>>;

    /// Open record for `number` with the latest checkout time, if any.
    fn latest_open_loan(&self, number: &str) -> Result<Option<LoanRecord>>;

    /// Insert an open record and return its id.
    fn insert_loan(&self, loan: &NewLoan, checkout_time: DateTime<Utc>) -> Result<i64>;

    fn close_loan(
        &self,
        id: i64,
        checkin_time: DateTime<Utc>,
        condition: Option<&str>,
    ) -> Result<()>;

    fn set_available(&self, number: &str, available: bool) -> Result<()>;
}
