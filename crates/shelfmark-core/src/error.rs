use thiserror::Error;

use crate::models::AccessionNo;

/// All errors that can occur in shelfmark-core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Entry already has accession number {0}")]
    AccessionAlreadyAssigned(AccessionNo),

    #[error("Unknown metadata source: {0}")]
    UnknownSource(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Import error in {path}: {message}")]
    Import { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
