//! One-shot import from a database written by the earlier web version of the
//! tracker. Choristers and logs are copied; instruments are not, because the
//! catalog is re-seeded on every start anyway.

use std::path::Path;

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OpenFlags};
use tracing::info;

use super::seed::reconcile_availability;
use super::sqlite::{format_timestamp, parse_timestamp};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub choristers: usize,
    pub logs: usize,
    /// Rows already present in the target and therefore not copied again.
    pub skipped: usize,
}

struct LegacyLog {
    division: String,
    group: Option<String>,
    chorister_name: String,
    phone: Option<String>,
    instrument_type: String,
    instrument_number: String,
    sign_out_time: String,
    sign_in_time: Option<String>,
    condition_returned: Option<String>,
}

/// Copy choristers and logs from `source` into `target` in one transaction.
/// Re-running the import skips rows that were already copied.
pub fn import_legacy(target: &mut Connection, source: &Path) -> Result<ImportReport> {
    if !source.exists() {
        bail!("legacy database {} not found", source.display());
    }

    let legacy = Connection::open_with_flags(source, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("failed to open legacy database {}", source.display()))?;

    let choristers = read_choristers(&legacy)?;
    let logs = read_logs(&legacy)?;

    let tx = target
        .transaction()
        .context("failed to begin legacy import")?;
    let mut report = ImportReport::default();

    for (name, division) in &choristers {
        let inserted = tx
            .execute(
                "INSERT INTO choristers (name, division)
                 SELECT ?1, ?2
                 WHERE NOT EXISTS (
                     SELECT 1 FROM choristers WHERE name = ?1 AND division = ?2
                 )",
                params![name, division],
            )
            .context("failed to copy chorister")?;
        if inserted == 0 {
            report.skipped += 1;
        } else {
            report.choristers += 1;
        }
    }

    for log in &logs {
        let sign_out_time = normalize_time(&log.sign_out_time)?;
        let sign_in_time = log
            .sign_in_time
            .as_deref()
            .map(normalize_time)
            .transpose()?;

        let inserted = tx
            .execute(
                "INSERT INTO logs (division, \"group\", chorister_name, phone, instrument_type,
                                   instrument_number, sign_out_time, sign_in_time, condition_returned)
                 SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
                 WHERE NOT EXISTS (
                     SELECT 1 FROM logs
                     WHERE instrument_number = ?6 AND sign_out_time = ?7 AND chorister_name = ?3
                 )",
                params![
                    log.division,
                    log.group,
                    log.chorister_name,
                    log.phone,
                    log.instrument_type,
                    log.instrument_number,
                    sign_out_time,
                    sign_in_time,
                    log.condition_returned,
                ],
            )
            .context("failed to copy log")?;
        if inserted == 0 {
            report.skipped += 1;
        } else {
            report.logs += 1;
        }
    }

    let on_loan = reconcile_availability(&tx)?;
    tx.commit().context("failed to commit legacy import")?;

    info!(
        choristers = report.choristers,
        logs = report.logs,
        skipped = report.skipped,
        on_loan,
        "imported legacy database"
    );
    Ok(report)
}

fn read_choristers(legacy: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = legacy
        .prepare("SELECT name, division FROM choristers ORDER BY id")
        .context("failed to prepare legacy chorister query")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .context("failed to read legacy choristers")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect legacy choristers")?;
    Ok(rows)
}

fn read_logs(legacy: &Connection) -> Result<Vec<LegacyLog>> {
    let mut stmt = legacy
        .prepare(
            "SELECT division, \"group\", chorister_name, phone, instrument_type,
                    instrument_number, sign_out_time, sign_in_time, condition_returned
             FROM logs ORDER BY id",
        )
        .context("failed to prepare legacy log query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(LegacyLog {
                division: row.get(0)?,
                group: row.get(1)?,
                chorister_name: row.get(2)?,
                phone: row.get(3)?,
                instrument_type: row.get(4)?,
                instrument_number: row.get(5)?,
                sign_out_time: row.get(6)?,
                sign_in_time: row.get(7)?,
                condition_returned: row.get(8)?,
            })
        })
        .context("failed to read legacy logs")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect legacy logs")?;
    Ok(rows)
}

/// Rewrite any RFC 3339 timestamp into the canonical stored form.
fn normalize_time(raw: &str) -> Result<String> {
    let at = parse_timestamp(0, raw).with_context(|| format!("unreadable timestamp {raw:?}"))?;
    Ok(format_timestamp(at))
}
