//! Error types for the mirror crate.

use thiserror::Error;

use aorc_common::AorcError;

/// Result type for mirror operations.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Errors that can occur while mirroring archives.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The archive host does not match the expected directory layout.
    /// Fatal for the whole run; raised before any transfer starts.
    #[error("archive host structure check failed: {0}")]
    Structure(String),

    /// A request timed out. Fatal for the whole batch (possible host outage),
    /// unlike a disconnect which is retried per locator.
    #[error("request to {0} timed out, aborting batch")]
    Timeout(String),

    #[error("failed to construct HTTP client: {0}")]
    Client(String),

    /// A mirrored object could not be read as a zip archive. Fatal for that
    /// one archive only; format errors are not transient and are not retried.
    #[error("archive {0} unreadable: {1}")]
    Archive(String, String),

    #[error(transparent)]
    Storage(#[from] AorcError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
