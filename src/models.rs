//! Domain models that mirror the SQLite schema. They stay plain data holders;
//! the invariants between them are enforced by [`crate::ledger::Ledger`].
//!
//! Serialized field names follow the persisted column names so JSON emitted by
//! the CLI lines up with what older tooling read straight out of the `logs`
//! table.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A physical instrument in the lending cupboard.
pub struct Instrument {
    pub id: i64,
    /// Category shown in pickers, e.g. `Violin`.
    pub kind: String,
    /// Human-assigned label painted on the case, e.g. `Violin-001`.
    pub number: String,
    /// False while a loan for this instrument is open.
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Reference data used to fill the sign-out pickers.
pub struct Chorister {
    pub id: i64,
    pub name: String,
    pub division: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One row of the loan history. Open while `checkin_time` is `None`.
pub struct LoanRecord {
    pub id: i64,
    pub division: String,
    pub group: Option<String>,
    pub chorister_name: String,
    pub phone: Option<String>,
    pub instrument_type: String,
    pub instrument_number: String,
    #[serde(rename = "sign_out_time")]
    pub checkout_time: DateTime<Utc>,
    #[serde(rename = "sign_in_time")]
    pub checkin_time: Option<DateTime<Utc>>,
    pub condition_returned: Option<String>,
}

impl LoanRecord {
    pub fn is_open(&self) -> bool {
        self.checkin_time.is_none()
    }

    /// True when any searchable field contains `needle`, ignoring ASCII case
    /// only. Same folding as the store's `LIKE` search.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        [
            &self.division,
            &self.chorister_name,
            &self.instrument_type,
            &self.instrument_number,
        ]
        .iter()
        .any(|field| field.to_ascii_lowercase().contains(&needle))
    }
}

/// Checkout request as submitted by a front end, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewLoan {
    pub division: String,
    pub group: Option<String>,
    pub chorister_name: String,
    pub phone: Option<String>,
    pub instrument_type: String,
    pub instrument_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> LoanRecord {
        LoanRecord {
            id: 1,
            division: "Adult Choir".into(),
            group: None,
            chorister_name: name.into(),
            phone: None,
            instrument_type: "Cello".into(),
            instrument_number: "Cello-001".into(),
            checkout_time: Utc::now(),
            checkin_time: None,
            condition_returned: None,
        }
    }

    #[test]
    fn matching_folds_ascii_case_only() {
        let loan = record("Zoë Ödegaard");

        assert!(loan.matches("ZOë"));
        assert!(!loan.matches("ZOË"));
        assert!(loan.matches("cello-0"));
        assert!(loan.matches("Ödegaard"));
        assert!(!loan.matches("ödegaard"));
    }
}
