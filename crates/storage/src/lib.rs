//! Blob storage layer for the AORC pipeline.
//!
//! Wraps the `object_store` crate with the operations the pipeline needs:
//! metadata-attaching writes (so every mirrored object is self-describing),
//! existence checks for resume pre-filtering, and the path builders that keep
//! mirror keys aligned with source URL structure.

pub mod object_store;
pub mod paths;

pub use object_store::{ObjectStorage, ObjectStorageConfig};
pub use paths::StoragePath;
