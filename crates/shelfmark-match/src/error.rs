use shelfmark_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("merge delegate unavailable: {0}")]
    DelegateUnavailable(String),

    #[error("merge delegate failed: {0}")]
    DelegateFailed(String),

    #[error("merge delegate returned unusable output: {0}")]
    DelegateOutput(String),

    #[error("no source supplied anything worth cataloguing")]
    BlankRecord,

    #[error("invalid source priority: {0}")]
    InvalidPriority(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, MatchError>;
