use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Open (creating if needed) the SQLite file at `path` and bring the schema up
/// to date.
pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("failed to create data directory")?;
        }
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Private database that disappears with the connection. Used by tests and
/// dry runs.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Create the three ledger tables when missing. Column names match the
/// databases written by the earlier web version so old files open unchanged.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS choristers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            division TEXT NOT NULL
        )",
        [],
    )
    .context("failed to create choristers table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS instruments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type TEXT NOT NULL,
            number TEXT NOT NULL UNIQUE,
            is_available INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )
    .context("failed to create instruments table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            division TEXT NOT NULL,
            \"group\" TEXT,
            chorister_name TEXT NOT NULL,
            phone TEXT,
            instrument_type TEXT NOT NULL,
            instrument_number TEXT NOT NULL,
            sign_out_time TEXT NOT NULL,
            sign_in_time TEXT,
            condition_returned TEXT
        )",
        [],
    )
    .context("failed to create logs table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_logs_open
         ON logs(instrument_number, sign_in_time)",
        [],
    )
    .context("failed to create logs index")?;

    Ok(())
}
