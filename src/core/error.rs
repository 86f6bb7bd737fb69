use thiserror::Error;

use crate::cache::CacheError;

/// Centralized error types for the application
///
/// All errors in the application are converted to this enum for consistent
/// error handling. Uses `thiserror` for automatic error conversion and
/// display formatting.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed user input: re-prompt the same dialogue state
    #[error("Validation error: {0}")]
    Validation(String),

    /// Privilege check failed: the flow is terminated
    #[error("Access denied")]
    AccessDenied,

    /// Entity already exists (e.g. admin uid): the flow aborts with no writes
    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    /// Cache layer errors (the coordinator usually degrades instead)
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Session store unreachable: fatal for the in-progress flow
    #[error("Session store error: {0}")]
    Store(String),

    /// Session scratch does not match the active flow (internal inconsistency)
    #[error("Session state error: {0}")]
    Session(String),

    /// Conference link generator failed (best-effort, reported to operations)
    #[error("Link provider error: {0}")]
    LinkProvider(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// HTTP/Fetch errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors (session blobs, cache entries)
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Store(err.to_string())
    }
}
