//! Assembly of per-hour national composites from regional grid files.
//!
//! Extracted files from all regions are registered into a timestamp-keyed
//! [`DatasetTracker`]; each complete group is merged under a no-conflicts
//! rule and written as a chunked Zarr store. Groups missing a region stay
//! pending rather than failing, since a later transfer pass may complete
//! them.

pub mod assemble;
pub mod error;
pub mod grid;
pub mod merge;
pub mod tracker;
pub mod zarr;

pub use assemble::{
    AssembleOutcome, AssemblerConfig, CompletenessShortfall, CompositeAssembler, CompositeRecord,
};
pub use error::{CompositeError, CompositeResult};
pub use grid::{load_regional_grid, RegionalGrid};
pub use merge::{merge_grids, CompositeGrid};
pub use tracker::{parse_grid_timestamp, DatasetTracker, GridFileEntry, TimestampGroup};
pub use zarr::{write_composite_store, CompositeWriterConfig, ZarrCompression};
