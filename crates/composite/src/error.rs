//! Error types for the composite crate.

use thiserror::Error;

use aorc_common::AorcError;

/// Result type for composite operations.
pub type CompositeResult<T> = Result<T, CompositeError>;

/// Errors that can occur during composite assembly.
#[derive(Debug, Error)]
pub enum CompositeError {
    /// A grid file could not be read or had an unexpected shape. Fatal for
    /// the one timestamp being assembled.
    #[error("failed to read grid file {path}: {message}")]
    Format { path: String, message: String },

    /// Two regions disagree on the value of the same cell. Never silently
    /// resolved; the operator must inspect the sources and rerun.
    #[error("value conflict at ({lat}, {lon}): {existing} vs {incoming} from region {region}")]
    MergeConflict {
        lat: f64,
        lon: f64,
        existing: f32,
        incoming: f32,
        region: String,
    },

    #[error("failed to write composite store: {0}")]
    ZarrWrite(String),

    #[error("failed to upload composite: {0}")]
    StorageUpload(String),

    #[error(transparent)]
    Storage(#[from] AorcError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
