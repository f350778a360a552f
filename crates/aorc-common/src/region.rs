//! River Forecast Center (RFC) region registry.
//!
//! The AORC archive is partitioned by RFC. Each region publishes its own
//! monthly archives under a predictable pair of directory segments, and the
//! full set of regions is the unit of completeness checking for composites.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::time::year_month;

/// Number of RFC regions covering the contiguous US.
pub const EXPECTED_REGION_COUNT: usize = 12;

/// A geographic partition of the source archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    /// Two-letter alias, e.g. "AB".
    pub alias: String,
    /// Full name, e.g. "ARKANSAS RED BASIN".
    pub name: String,
}

impl RegionInfo {
    pub fn new(alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            name: name.into(),
        }
    }

    /// Top-level catalog directory for this region on the archive host.
    pub fn catalog_segment(&self) -> String {
        format!("AORC_{}RFC_4km", self.alias)
    }

    /// Precipitation partition directory below the catalog directory.
    pub fn partition_segment(&self) -> String {
        format!("{}RFC_precip_partition", self.alias)
    }

    /// Monthly archive filename for the given reference month.
    pub fn archive_filename(&self, month: NaiveDate) -> String {
        format!("AORC_APCP_4KM_{}RFC_{}.zip", self.alias, year_month(month))
    }
}

/// The default registry: all twelve CONUS RFCs.
pub fn default_regions() -> Vec<RegionInfo> {
    [
        ("AB", "ARKANSAS RED BASIN"),
        ("CB", "COLORADO BASIN"),
        ("CN", "CALIFORNIA NEVADA"),
        ("LM", "LOWER MISSISSIPPI"),
        ("MA", "MID ATLANTIC"),
        ("MB", "MISSOURI BASIN"),
        ("NC", "NORTH CENTRAL"),
        ("NE", "NORTHEAST"),
        ("NW", "NORTHWEST"),
        ("OH", "OHIO"),
        ("SE", "SOUTHEAST"),
        ("WG", "WEST GULF"),
    ]
    .iter()
    .map(|(alias, name)| RegionInfo::new(*alias, *name))
    .collect()
}
