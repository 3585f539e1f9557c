use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 1;

pub fn apply_pragmas(conn: &Connection, on_disk: bool) -> Result<()> {
    if on_disk {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
    }
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        -- AUTOINCREMENT: accession numbers only grow and are never handed out twice,
        -- even after the highest entry is withdrawn.
        CREATE TABLE IF NOT EXISTS catalog_entries (
            accession_no INTEGER PRIMARY KEY AUTOINCREMENT,
            title        TEXT NOT NULL DEFAULT '',
            author       TEXT NOT NULL DEFAULT '',
            published    TEXT NOT NULL DEFAULT '',
            year         TEXT NOT NULL DEFAULT '',
            oclc_no      TEXT NOT NULL DEFAULT '',
            lc_no        TEXT NOT NULL DEFAULT '',
            isbn         TEXT NOT NULL DEFAULT '',
            added_at     TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_catalog_isbn ON catalog_entries(isbn);
        CREATE INDEX IF NOT EXISTS idx_catalog_year ON catalog_entries(year);
        ",
    )?;
    Ok(())
}
