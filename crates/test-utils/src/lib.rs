//! Shared test utilities for the AORC pipeline workspace.
//!
//! Provides fixture generators (regional NetCDF grids, zipped month
//! archives) and an instrumented fake archive host for exercising the
//! transfer engine without a network.

pub mod fake_host;
pub mod generators;

pub use fake_host::FakeArchiveHost;
pub use generators::{grid_filename, month_archive, write_regional_grid};
