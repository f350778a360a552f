//! AORC mirror-and-composite batch pipeline.
//!
//! Orchestrates one batch: verify the host layout, enumerate sources,
//! pre-filter already-mirrored archives, transfer, extract, register, and
//! assemble composites. The two phases are strictly sequential: registration
//! only starts after the transfer phase completes.

pub mod config;
pub mod run;

pub use config::PipelineConfig;
pub use run::{run, run_with_fetcher, PipelineSummary};
