use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::catalog::{expand, CatalogEntry, ChoristerSeed};

/// Insert the sample roster, but only into an empty table. Returns how many
/// rows were inserted.
pub fn seed_choristers(conn: &Connection, roster: &[ChoristerSeed]) -> Result<usize> {
    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM choristers", [], |row| row.get(0))
        .context("failed to count choristers")?;

    if existing > 0 {
        debug!(existing, "chorister roster already present");
        return Ok(0);
    }

    let mut stmt = conn
        .prepare("INSERT INTO choristers (name, division) VALUES (?1, ?2)")
        .context("failed to prepare chorister insert")?;
    for chorister in roster {
        stmt.execute(params![chorister.name, chorister.division])
            .context("failed to insert chorister")?;
    }

    info!(count = roster.len(), "seeded chorister roster");
    Ok(roster.len())
}

/// Replace every instrument row with a fresh expansion of `catalog`, then mark
/// unavailable anything that still has an open log. Runs as one transaction so
/// a half-written catalog is never visible.
pub fn reseed_instruments(conn: &mut Connection, catalog: &[CatalogEntry]) -> Result<usize> {
    let tx = conn
        .transaction()
        .context("failed to begin instrument reseed")?;

    tx.execute("DELETE FROM instruments", [])
        .context("failed to clear instruments")?;

    let rows = expand(catalog);
    {
        let mut stmt = tx
            .prepare("INSERT INTO instruments (type, number, is_available) VALUES (?1, ?2, 1)")
            .context("failed to prepare instrument insert")?;
        for (kind, number) in &rows {
            stmt.execute(params![kind, number])
                .with_context(|| format!("failed to insert instrument {number}"))?;
        }
    }

    let on_loan = reconcile_availability(&tx)?;
    tx.commit().context("failed to commit instrument reseed")?;

    info!(instruments = rows.len(), on_loan, "reseeded instrument catalog");
    Ok(rows.len())
}

/// Derive `is_available` from the open logs. Returns how many instruments are
/// currently out.
pub fn reconcile_availability(conn: &Connection) -> Result<usize> {
    conn.execute("UPDATE instruments SET is_available = 1", [])
        .context("failed to reset availability")?;
    let on_loan = conn
        .execute(
            "UPDATE instruments SET is_available = 0
             WHERE number IN (
                 SELECT instrument_number FROM logs WHERE sign_in_time IS NULL
             )",
            [],
        )
        .context("failed to mark instruments on loan")?;
    Ok(on_loan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::open_in_memory;
    use pretty_assertions::assert_eq;

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn chorister_seeding_is_idempotent() {
        let conn = open_in_memory().unwrap();
        let roster = vec![
            ChoristerSeed::new("John Doe", "Adult Choir"),
            ChoristerSeed::new("Mary Youth", "Youth Choir"),
        ];

        assert_eq!(seed_choristers(&conn, &roster).unwrap(), 2);
        assert_eq!(seed_choristers(&conn, &roster).unwrap(), 0);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM choristers"), 2);
    }

    #[test]
    fn roster_is_left_alone_when_someone_already_exists() {
        let conn = open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO choristers (name, division) VALUES ('Solo', 'Adult Choir')",
            [],
        )
        .unwrap();

        let inserted = seed_choristers(&conn, &[ChoristerSeed::new("John Doe", "Adult Choir")])
            .unwrap();

        assert_eq!(inserted, 0);
        let names: String = conn
            .query_row("SELECT group_concat(name) FROM choristers", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(names, "Solo");
    }

    #[test]
    fn reseeding_replaces_instruments() {
        let mut conn = open_in_memory().unwrap();
        reseed_instruments(&mut conn, &[CatalogEntry::new("Violin", 3)]).unwrap();
        let inserted = reseed_instruments(&mut conn, &[CatalogEntry::new("Harp", 1)]).unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM instruments"), 1);
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM instruments WHERE number = 'Harp-001'"),
            1
        );
    }

    #[test]
    fn reseeding_keeps_open_loans_unavailable() {
        let mut conn = open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO logs (division, chorister_name, instrument_type, instrument_number, sign_out_time)
             VALUES ('Adult Choir', 'Jane Smith', 'Violin', 'Violin-002', '2025-01-05T10:00:00.000Z')",
            [],
        )
        .unwrap();

        reseed_instruments(&mut conn, &[CatalogEntry::new("Violin", 3)]).unwrap();

        assert_eq!(
            count(&conn, "SELECT is_available FROM instruments WHERE number = 'Violin-002'"),
            0
        );
        assert_eq!(
            count(&conn, "SELECT SUM(is_available) FROM instruments"),
            2
        );
    }
}
