//! Mirroring of dated AORC archives into blob storage.
//!
//! The flow is enumerate → transfer → extract. `SourceEnumerator` derives one
//! locator per (region, month) after probing the host's directory layout,
//! `TransferEngine` copies archives concurrently with retry and provenance
//! metadata, and `ArchiveExtractor` unpacks a mirrored archive into per-hour
//! grid files for the composite stage.

pub mod enumerate;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod transfer;

pub use enumerate::{SourceEnumerator, SourceLocator};
pub use error::{MirrorError, MirrorResult};
pub use extract::{ArchiveExtractor, ExtractedArchive};
pub use fetch::{ArchiveFetcher, FetchError, FetchedArchive, HttpFetcher, ProbeInfo};
pub use transfer::{TransferConfig, TransferEngine, TransferRecord};
