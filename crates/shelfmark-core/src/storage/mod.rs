pub mod database;
pub mod repositories;

pub use database::{open_database, open_in_memory, ConnectionPool};
pub use repositories::{CatalogRepository, InMemoryCatalog, SqliteCatalogRepository};
