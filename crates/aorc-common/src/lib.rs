//! Shared types for the AORC mirror and composite pipeline.
//!
//! Holds the pieces every other crate needs: the RFC region registry,
//! month/hour time helpers, provenance strings, and the common error type.

pub mod error;
pub mod provenance;
pub mod region;
pub mod time;

pub use error::{AorcError, AorcResult};
pub use provenance::ProvenanceInfo;
pub use region::{default_regions, RegionInfo, EXPECTED_REGION_COUNT};
pub use time::{first_record_date, hour_key, month_range, parse_hour_suffix, year_month};
