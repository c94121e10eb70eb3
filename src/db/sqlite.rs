//! SQLite adapter for the storage port.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Params, Row, TransactionBehavior};
use tracing::{debug, warn};

use crate::catalog::{CatalogEntry, ChoristerSeed};
use crate::error::{ErrorKind, LedgerResult};
use crate::models::{Chorister, Instrument, LoanRecord, NewLoan};

use super::connection;
use super::import::{import_legacy, ImportReport};
use super::seed::{reseed_instruments, seed_choristers};
use super::store::{LoanStore, LoanTx};

const LOAN_COLUMNS: &str = "id, division, \"group\", chorister_name, phone, instrument_type, \
     instrument_number, sign_out_time, sign_in_time, condition_returned";

/// Ledger storage backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: connection::open_in_memory()?,
        })
    }

    /// Startup seeding: roster only when empty, instruments always replaced.
    pub fn seed(
        &mut self,
        catalog: &[CatalogEntry],
        roster: &[ChoristerSeed],
    ) -> Result<(usize, usize)> {
        let choristers = seed_choristers(&self.conn, roster)?;
        let instruments = reseed_instruments(&mut self.conn, catalog)?;
        Ok((choristers, instruments))
    }

    pub fn import_legacy(&mut self, source: &Path) -> Result<ImportReport> {
        import_legacy(&mut self.conn, source)
    }

    /// Raw connection, for maintenance and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl LoanStore for SqliteStore {
    fn instrument_types(&self) -> Result<Vec<String>> {
        fetch_strings(
            &self.conn,
            "SELECT type FROM instruments GROUP BY type ORDER BY MIN(id)",
            [],
        )
        .context("failed to load instrument types")
    }

    fn available_numbers(&self, kind: &str) -> Result<Vec<String>> {
        fetch_strings(
            &self.conn,
            "SELECT number FROM instruments
             WHERE type = ?1 AND is_available = 1
             ORDER BY id",
            [kind],
        )
        .context("failed to load available instruments")
    }

    fn history(&self, search: Option<&str>) -> Result<Vec<LoanRecord>> {
        let needle = search.map(str::trim).filter(|s| !s.is_empty());
        let loans = match needle {
            Some(needle) => {
                let pattern = format!("%{}%", escape_like(needle));
                fetch_loans(
                    &self.conn,
                    &format!(
                        "SELECT {LOAN_COLUMNS} FROM logs
                         WHERE division LIKE ?1 ESCAPE '\\'
                            OR chorister_name LIKE ?1 ESCAPE '\\'
                            OR instrument_type LIKE ?1 ESCAPE '\\'
                            OR instrument_number LIKE ?1 ESCAPE '\\'
                         ORDER BY sign_out_time DESC, id DESC"
                    ),
                    [pattern],
                )
            }
            None => fetch_loans(
                &self.conn,
                &format!("SELECT {LOAN_COLUMNS} FROM logs ORDER BY sign_out_time DESC, id DESC"),
                [],
            ),
        };
        loans.context("failed to load loan history")
    }

    fn open_loans(&self) -> Result<Vec<LoanRecord>> {
        fetch_loans(
            &self.conn,
            &format!(
                "SELECT {LOAN_COLUMNS} FROM logs
                 WHERE sign_in_time IS NULL
                 ORDER BY sign_out_time DESC, id DESC"
            ),
            [],
        )
        .context("failed to load open loans")
    }

    fn divisions(&self) -> Result<Vec<String>> {
        fetch_strings(
            &self.conn,
            "SELECT DISTINCT division FROM choristers ORDER BY division COLLATE NOCASE",
            [],
        )
        .context("failed to load divisions")
    }

    fn choristers(&self, division: &str) -> Result<Vec<Chorister>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, division FROM choristers
                 WHERE division = ?1
                 ORDER BY name COLLATE NOCASE, id",
            )
            .context("failed to prepare chorister query")?;
        let choristers = stmt
            .query_map([division], |row| {
                Ok(Chorister {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    division: row.get(2)?,
                })
            })
            .context("failed to load choristers")?
            .collect::<Result<Vec<_>, _>>()
            .context("failed to collect choristers")?;
        Ok(choristers)
    }

    fn transaction<T, F>(&mut self, work: F) -> LedgerResult<T>
    where
        F: FnOnce(&dyn LoanTx) -> LedgerResult<T>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin transaction")?;

        let outcome = work(&SqliteTx { conn: &*tx });

        match outcome {
            Ok(value) => {
                tx.commit().context("failed to commit transaction")?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                if err.kind() == ErrorKind::Storage {
                    warn!(error = %err, "transaction rolled back");
                } else {
                    debug!(error = %err, "transaction rolled back");
                }
                Err(err)
            }
        }
    }
}

/// Transaction-scoped view handed to [`LoanStore::transaction`] closures.
struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl LoanTx for SqliteTx<'_> {
    fn instrument(&self, number: &str) -> Result<Option<Instrument>> {
        self.conn
            .query_row(
                "SELECT id, type, number, is_available FROM instruments WHERE number = ?1",
                [number],
                |row| {
                    Ok(Instrument {
                        id: row.get(0)?,
                        kind: row.get(1)?,
                        number: row.get(2)?,
                        available: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("failed to look up instrument")
    }

    fn latest_open_loan(&self, number: &str) -> Result<Option<LoanRecord>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {LOAN_COLUMNS} FROM logs
                     WHERE instrument_number = ?1 AND sign_in_time IS NULL
                     ORDER BY sign_out_time DESC, id DESC
                     LIMIT 1"
                ),
                [number],
                loan_from_row,
            )
            .optional()
            .context("failed to look up open loan")
    }

    fn insert_loan(&self, loan: &NewLoan, checkout_time: DateTime<Utc>) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO logs (division, \"group\", chorister_name, phone,
                                   instrument_type, instrument_number, sign_out_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    loan.division,
                    loan.group,
                    loan.chorister_name,
                    loan.phone,
                    loan.instrument_type,
                    loan.instrument_number,
                    format_timestamp(checkout_time),
                ],
            )
            .context("failed to insert loan")?;
        Ok(self.conn.last_insert_rowid())
    }

    fn close_loan(
        &self,
        id: i64,
        checkin_time: DateTime<Utc>,
        condition: Option<&str>,
    ) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE logs SET sign_in_time = ?1, condition_returned = ?2
                 WHERE id = ?3 AND sign_in_time IS NULL",
                params![format_timestamp(checkin_time), condition, id],
            )
            .context("failed to close loan")?;

        if updated == 0 {
            Err(anyhow!("log {id} is not open"))
        } else {
            Ok(())
        }
    }

    fn set_available(&self, number: &str, available: bool) -> Result<()> {
        self.conn
            .execute(
                "UPDATE instruments SET is_available = ?1 WHERE number = ?2",
                params![available, number],
            )
            .context("failed to update instrument availability")?;
        Ok(())
    }
}

fn fetch_strings<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql).context("failed to prepare query")?;
    let values = stmt
        .query_map(params, |row| row.get(0))
        .context("failed to run query")?
        .collect::<Result<Vec<String>, _>>()
        .context("failed to collect rows")?;
    Ok(values)
}

fn fetch_loans<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<LoanRecord>> {
    let mut stmt = conn.prepare(sql).context("failed to prepare loan query")?;
    let loans = stmt
        .query_map(params, loan_from_row)
        .context("failed to run loan query")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect loans")?;
    Ok(loans)
}

fn loan_from_row(row: &Row<'_>) -> rusqlite::Result<LoanRecord> {
    let checkout_raw: String = row.get(7)?;
    let checkin_raw: Option<String> = row.get(8)?;
    Ok(LoanRecord {
        id: row.get(0)?,
        division: row.get(1)?,
        group: row.get(2)?,
        chorister_name: row.get(3)?,
        phone: row.get(4)?,
        instrument_type: row.get(5)?,
        instrument_number: row.get(6)?,
        checkout_time: parse_timestamp(7, &checkout_raw)?,
        checkin_time: checkin_raw
            .map(|raw| parse_timestamp(8, &raw))
            .transpose()?,
        condition_returned: row.get(9)?,
    })
}

/// Millisecond RFC 3339 with a `Z` suffix; sorts lexically in time order.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

/// Make `%`, `_` and `\` match literally inside a LIKE pattern.
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
