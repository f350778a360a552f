//! Error type shared by the storage boundary and configuration loading.

use thiserror::Error;

/// Result type alias using AorcError.
pub type AorcResult<T> = Result<T, AorcError>;

/// Errors raised by the shared infrastructure crates.
#[derive(Debug, Error)]
pub enum AorcError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),
}

impl From<std::io::Error> for AorcError {
    fn from(err: std::io::Error) -> Self {
        AorcError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for AorcError {
    fn from(err: serde_json::Error) -> Self {
        AorcError::InvalidConfig(format!("JSON error: {}", err))
    }
}
