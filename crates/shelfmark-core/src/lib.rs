//! Shelfmark core — book record models, catalog storage and configuration.

pub mod config;
pub mod error;
pub mod import;
pub mod models;
pub mod storage;

pub use config::{AppConfig, CallNumberConfig, CatalogConfig, DelegateConfig, MatchingConfig, MergeConfig};
pub use error::{CoreError, Result};
pub use import::{import_csv, import_csv_path, ColumnMapping, ImportReport};
pub use models::*;

pub use storage::{
    open_database, open_in_memory, CatalogRepository, ConnectionPool, InMemoryCatalog,
    SqliteCatalogRepository,
};
