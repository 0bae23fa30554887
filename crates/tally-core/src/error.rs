//! Error types for tally-core
//!
//! Only [`Error::NotFound`] and [`Error::Storage`] are expected to cross the
//! status pipeline boundary. Gateway and cache failures have their own local
//! error types and are recovered inside the pipeline.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// A budget (or other record) does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The budget store itself failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Input rejected before reaching the store
    #[error("validation error: {0}")]
    Validation(String),

    /// Invalid settings
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Whether this error points at a systemic problem rather than bad input
    #[must_use]
    pub fn is_systemic(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Configuration(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
