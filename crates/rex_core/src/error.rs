use thiserror::Error;

/// Errors raised while validating a record before it is persisted or acted on.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("unknown category: {0}")]
    UnknownCategory(String),
}

/// Errors surfaced by the persistent memory store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors surfaced by an external reasoner backend.
#[derive(Debug, Error)]
pub enum ReasonerError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("exhausted retries ({attempts}): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ReasonerError>,
    },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("rate limited, retry after {0:?}")]
    RateLimited(std::time::Duration),
}
