//! Provenance strings recorded on every mirrored and composited object.
//!
//! These are opaque to the pipeline: they are written verbatim into object
//! metadata so a reader can trace which image and script produced the data.

use serde::{Deserialize, Serialize};

/// Docker image identifier and script path for the running batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceInfo {
    pub docker_image: String,
    pub script_path: String,
}

impl ProvenanceInfo {
    pub fn new(docker_image: impl Into<String>, script_path: impl Into<String>) -> Self {
        Self {
            docker_image: docker_image.into(),
            script_path: script_path.into(),
        }
    }

    /// Read provenance from `DOCKER_IMAGE` / `PIPELINE_SCRIPT`.
    ///
    /// Missing variables become empty strings; the values are never validated.
    pub fn from_env() -> Self {
        Self {
            docker_image: std::env::var("DOCKER_IMAGE").unwrap_or_default(),
            script_path: std::env::var("PIPELINE_SCRIPT").unwrap_or_default(),
        }
    }
}
