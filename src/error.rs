//! Error taxonomy for the loan ledger. Callers match on [`ErrorKind`] to pick
//! a status; the messages themselves are what a chorister sees on screen, so
//! they stay short and phrased for the person at the instrument cupboard.

use thiserror::Error;

/// Failure raised by a ledger operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Checkout referenced an instrument number that is not catalogued.
    #[error("Instrument not found.")]
    InstrumentNotFound { number: String },

    /// Checkin found no open log entry for the instrument.
    #[error("Log not found")]
    OpenLoanNotFound { number: String },

    /// The instrument is currently on loan to someone else.
    #[error("Instrument is already signed out! Please sign it in before signing out again.")]
    AlreadySignedOut { number: String },

    /// A required field was blank.
    #[error("{field} is required.")]
    MissingField { field: &'static str },

    /// The submitted type does not match the catalogued instrument.
    #[error("{number} is a {actual}, not a {submitted}.")]
    TypeMismatch {
        number: String,
        actual: String,
        submitted: String,
    },

    /// Anything the storage adapter could not complete.
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Coarse classification used by the request layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Storage,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InstrumentNotFound { .. } | LedgerError::OpenLoanNotFound { .. } => {
                ErrorKind::NotFound
            }
            LedgerError::AlreadySignedOut { .. } => ErrorKind::Conflict,
            LedgerError::MissingField { .. } | LedgerError::TypeMismatch { .. } => {
                ErrorKind::Validation
            }
            LedgerError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// HTTP-style status code for the error kind.
    pub fn status(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 400,
            ErrorKind::Validation => 422,
            ErrorKind::Storage => 500,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (
                LedgerError::InstrumentNotFound {
                    number: "Violin-099".into(),
                },
                404,
            ),
            (
                LedgerError::OpenLoanNotFound {
                    number: "Violin-001".into(),
                },
                404,
            ),
            (
                LedgerError::AlreadySignedOut {
                    number: "Violin-001".into(),
                },
                400,
            ),
            (LedgerError::MissingField { field: "Division" }, 422),
            (LedgerError::Storage(anyhow::anyhow!("disk full")), 500),
        ];

        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[test]
    fn conflict_message_asks_for_sign_in_first() {
        let err = LedgerError::AlreadySignedOut {
            number: "Flute-002".into(),
        };
        assert!(err
            .to_string()
            .contains("sign it in before signing out again"));
    }
}
