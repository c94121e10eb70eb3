//! The loan ledger: the only place that changes who holds an instrument.
//!
//! Every mutation runs inside one [`LoanStore::transaction`] so the log row and
//! the instrument's availability flag change together or not at all. Mutators
//! take `&mut self`, which serializes them within the process; the store's
//! transaction takes the database write lock before reading, which covers
//! anything outside it.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::db::LoanStore;
use crate::error::{ErrorKind, LedgerError, LedgerResult};
use crate::models::{Chorister, LoanRecord, NewLoan};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send>;

pub struct Ledger<S> {
    store: S,
    clock: Clock,
}

impl<S: LoanStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Utc::now)
    }

    /// Build a ledger that stamps loans with `clock` instead of the wall clock.
    pub fn with_clock(store: S, clock: impl Fn() -> DateTime<Utc> + Send + 'static) -> Self {
        Self {
            store,
            clock: Box::new(clock),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Numbers of instruments of `kind` that can be signed out right now.
    pub fn list_available(&self, kind: &str) -> LedgerResult<Vec<String>> {
        let numbers = self.store.available_numbers(kind.trim())?;
        debug!(kind, count = numbers.len(), "listed available instruments");
        Ok(numbers)
    }

    /// Open a loan. Returns the id of the new log entry.
    pub fn checkout(&mut self, request: NewLoan) -> LedgerResult<i64> {
        let mut loan = validate(request)?;
        let now = (self.clock)();

        let outcome = self.store.transaction(|tx| {
            let instrument = tx.instrument(&loan.instrument_number)?.ok_or_else(|| {
                LedgerError::InstrumentNotFound {
                    number: loan.instrument_number.clone(),
                }
            })?;

            if !instrument.available {
                return Err(LedgerError::AlreadySignedOut {
                    number: instrument.number,
                });
            }

            if !instrument.kind.eq_ignore_ascii_case(&loan.instrument_type) {
                return Err(LedgerError::TypeMismatch {
                    number: instrument.number,
                    actual: instrument.kind,
                    submitted: loan.instrument_type.clone(),
                });
            }
            // Keep the catalogued spelling in history.
            loan.instrument_type = instrument.kind;

            let id = tx.insert_loan(&loan, now)?;
            tx.set_available(&loan.instrument_number, false)?;
            Ok(id)
        });

        match &outcome {
            Ok(id) => info!(
                id,
                number = %loan.instrument_number,
                chorister = %loan.chorister_name,
                division = %loan.division,
                "instrument signed out"
            ),
            Err(err) => log_rejection("checkout", &loan.instrument_number, err),
        }
        outcome
    }

    /// Close the newest open loan for `number`. Returns the closed log id.
    pub fn checkin(&mut self, number: &str, condition: Option<&str>) -> LedgerResult<i64> {
        let number = required(number, "Instrument number")?;
        let condition = optional(condition);
        let now = (self.clock)();

        let outcome = self.store.transaction(|tx| {
            let open = tx
                .latest_open_loan(&number)?
                .ok_or_else(|| LedgerError::OpenLoanNotFound {
                    number: number.clone(),
                })?;

            tx.close_loan(open.id, now, condition.as_deref())?;
            tx.set_available(&number, true)?;
            Ok(open.id)
        });

        match &outcome {
            Ok(id) => info!(
                id,
                number = %number,
                condition = condition.as_deref().unwrap_or(""),
                "instrument signed in"
            ),
            Err(err) => log_rejection("checkin", &number, err),
        }
        outcome
    }

    /// Loan history, newest first. A blank `search` returns everything.
    pub fn history(&self, search: Option<&str>) -> LedgerResult<Vec<LoanRecord>> {
        let records = self.store.history(search)?;
        debug!(search = search.unwrap_or(""), count = records.len(), "queried history");
        Ok(records)
    }

    pub fn open_loans(&self) -> LedgerResult<Vec<LoanRecord>> {
        Ok(self.store.open_loans()?)
    }

    pub fn instrument_types(&self) -> LedgerResult<Vec<String>> {
        Ok(self.store.instrument_types()?)
    }

    pub fn divisions(&self) -> LedgerResult<Vec<String>> {
        Ok(self.store.divisions()?)
    }

    pub fn choristers(&self, division: &str) -> LedgerResult<Vec<Chorister>> {
        Ok(self.store.choristers(division)?)
    }
}

fn log_rejection(operation: &str, number: &str, err: &LedgerError) {
    match err.kind() {
        ErrorKind::Storage | ErrorKind::Conflict => {
            warn!(operation, number, error = %err, "ledger operation failed")
        }
        _ => info!(operation, number, error = %err, "ledger operation rejected"),
    }
}

fn validate(request: NewLoan) -> LedgerResult<NewLoan> {
    Ok(NewLoan {
        division: required(&request.division, "Division")?,
        chorister_name: required(&request.chorister_name, "Chorister name")?,
        instrument_type: required(&request.instrument_type, "Instrument type")?,
        instrument_number: required(&request.instrument_number, "Instrument number")?,
        group: optional(request.group.as_deref()),
        phone: optional(request.phone.as_deref()),
    })
}

fn required(value: &str, field: &'static str) -> LedgerResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(LedgerError::MissingField { field })
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
