mod connection;
mod migrations;
mod schema;

pub use connection::ConnectionPool;
pub use migrations::{get_applied_versions, run_migrations, Migration};
pub use schema::SCHEMA_VERSION;

use std::path::Path;

use crate::error::Result;

/// Opens (creating if needed) a catalog database file with an up-to-date schema.
pub fn open_database(path: &Path) -> Result<ConnectionPool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    migrated(ConnectionPool::open(path)?)
}

/// A throwaway catalog, mostly for tests.
pub fn open_in_memory() -> Result<ConnectionPool> {
    migrated(ConnectionPool::open_in_memory()?)
}

fn migrated(pool: ConnectionPool) -> Result<ConnectionPool> {
    let applied = run_migrations(&pool.get_connection())?;
    if applied > 0 {
        tracing::info!(path = ?pool.path(), applied, "catalog schema migrated");
    }
    Ok(pool)
}
