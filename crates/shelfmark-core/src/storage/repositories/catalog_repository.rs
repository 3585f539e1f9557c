use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CoreError, Result};
use crate::models::{AccessionNo, CatalogEntry};
use crate::storage::database::{self, ConnectionPool};

use super::CatalogRepository;

const SELECT_COLUMNS: &str =
    "SELECT accession_no, title, author, published, year, oclc_no, lc_no, isbn, added_at
     FROM catalog_entries";

pub struct SqliteCatalogRepository {
    pool: ConnectionPool,
}

impl SqliteCatalogRepository {
    pub fn open(path: &Path) -> Result<Self> {
        let pool = database::open_database(path)?;
        Ok(Self { pool })
    }

    pub fn open_in_memory() -> Result<Self> {
        let pool = database::open_in_memory()?;
        Ok(Self { pool })
    }

    pub fn path(&self) -> Option<&str> {
        self.pool.path()
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<CatalogEntry> {
        let accession: i64 = row.get(0)?;
        let added_at: String = row.get(8)?;
        Ok(CatalogEntry {
            accession_no: u64::try_from(accession).ok().map(AccessionNo::new),
            title: row.get(1)?,
            author: row.get(2)?,
            published: row.get(3)?,
            year: row.get(4)?,
            oclc_no: row.get(5)?,
            lc_no: row.get(6)?,
            isbn: row.get(7)?,
            added_at: DateTime::parse_from_rfc3339(&added_at)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }

    fn insert(conn: &Connection, entry: &CatalogEntry) -> Result<AccessionNo> {
        let added_at = entry.added_at.unwrap_or_else(Utc::now);
        conn.execute(
            "INSERT INTO catalog_entries
                (title, author, published, year, oclc_no, lc_no, isbn, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.title.trim(),
                entry.author.trim(),
                entry.published.trim(),
                entry.year.trim(),
                entry.oclc_no.trim(),
                entry.lc_no.trim(),
                entry.isbn.trim(),
                added_at.to_rfc3339(),
            ],
        )?;
        let rowid = conn.last_insert_rowid();
        u64::try_from(rowid)
            .map(AccessionNo::new)
            .map_err(|_| CoreError::Database(rusqlite::Error::IntegralValueOutOfRange(0, rowid)))
    }
}

impl CatalogRepository for SqliteCatalogRepository {
    fn fetch_all_entries(&self) -> Result<Vec<CatalogEntry>> {
        let conn = self.pool.get_connection();
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY accession_no"))?;
        let rows = stmt.query_map([], Self::row_to_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn append_entry(&self, entry: CatalogEntry) -> Result<AccessionNo> {
        if let Some(existing) = entry.accession_no {
            return Err(CoreError::AccessionAlreadyAssigned(existing));
        }

        let accession_no = self.pool.write(|tx| Self::insert(tx, &entry))?;

        tracing::info!(%accession_no, title = %entry.title, "catalog entry appended");
        Ok(accession_no)
    }

    fn find_entry(&self, accession_no: AccessionNo) -> Result<Option<CatalogEntry>> {
        let conn = self.pool.get_connection();
        let entry = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE accession_no = ?1"),
                params![accession_no.value() as i64],
                Self::row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn withdraw_entry(&self, accession_no: AccessionNo) -> Result<bool> {
        let conn = self.pool.get_connection();
        let removed = conn.execute(
            "DELETE FROM catalog_entries WHERE accession_no = ?1",
            params![accession_no.value() as i64],
        )?;
        Ok(removed > 0)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.pool.get_connection();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM catalog_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
