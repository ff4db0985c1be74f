//! Error types for the congregation site.

use thiserror::Error;

/// Errors that can occur in congregation operations.
#[derive(Error, Debug)]
pub enum CongregationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read '{path}' from the data store: {message}")]
    StoreRead { path: String, message: String },

    #[error("Failed to write '{path}' to the data store: {message}")]
    StoreWrite { path: String, message: String },

    #[error("Failed to load events: {0}")]
    LoadEvents(#[source] Box<CongregationError>),

    #[error("Failed to load sermons: {0}")]
    LoadSermons(#[source] Box<CongregationError>),

    #[error("Invalid day of week {0}, expected 0 (Sunday) through 6 (Saturday)")]
    InvalidWeekday(i64),

    #[error("Occurrence count must be at least 1")]
    InvalidFanOut,

    #[error("Malformed record '{key}': {reason}")]
    MalformedRecord { key: String, reason: String },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Authentication failed ({code}): {message}")]
    Auth { code: String, message: String },

    #[error("Verification code not found")]
    VerificationCodeNotFound,

    #[error("Invalid verification code")]
    InvalidVerificationCode,

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Only administrators can do that")]
    Forbidden,

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CongregationError {
    pub(crate) fn auth(code: impl Into<String>, message: impl Into<String>) -> Self {
        CongregationError::Auth {
            code: code.into(),
            message: message.into(),
        }
    }

    /// True for failures caused by the backing store rather than by the caller.
    pub fn is_store_failure(&self) -> bool {
        match self {
            CongregationError::StoreRead { .. }
            | CongregationError::StoreWrite { .. }
            | CongregationError::Http(_) => true,
            CongregationError::LoadEvents(inner) | CongregationError::LoadSermons(inner) => {
                inner.is_store_failure()
            }
            _ => false,
        }
    }
}

/// Result type alias for congregation operations.
pub type CongregationResult<T> = Result<T, CongregationError>;
