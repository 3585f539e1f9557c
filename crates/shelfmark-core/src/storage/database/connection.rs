use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::schema::apply_pragmas;
use crate::error::Result;

/// The catalog's single SQLite connection.
///
/// Every statement runs while the mutex is held, which makes it the
/// per-catalog critical section for accession-number assignment.
pub struct ConnectionPool {
    path: Option<String>,
    connection: Mutex<Connection>,
}

impl ConnectionPool {
    pub fn open(path: &Path) -> Result<Self> {
        Self::wrap(Connection::open(path)?, Some(path))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::wrap(Connection::open_in_memory()?, None)
    }

    fn wrap(conn: Connection, path: Option<&Path>) -> Result<Self> {
        apply_pragmas(&conn, path.is_some())?;
        Ok(Self {
            path: path.map(|p| p.to_string_lossy().into_owned()),
            connection: Mutex::new(conn),
        })
    }

    pub fn get_connection(&self) -> MutexGuard<'_, Connection> {
        // SQLite rolls back whatever a panicking holder left open.
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` inside an immediate (write-locking) transaction and commits
    /// when it succeeds.
    pub fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.get_connection();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}
