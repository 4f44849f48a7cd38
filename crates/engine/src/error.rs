//! Engine error types.

use thiserror::Error;

/// Errors surfaced by the search engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("internal error")]
    Internal(#[from] anyhow::Error),

    #[error("unknown listing type: {0}")]
    UnknownListingType(String),

    #[error("invalid catalog: {0}")]
    Catalog(String),

    #[error("invalid search input: {0}")]
    Validation(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
