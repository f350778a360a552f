//! Per-batch index grouping extracted grid files by embedded timestamp.
//!
//! Per-hour siblings across independently-named regional files cannot be
//! discovered without re-sorting the whole flat file list, so registration
//! keys every file by the hour timestamp embedded in its name. This replaces
//! directory glob scanning: grouping never depends on iteration order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use aorc_common::time::parse_hour_suffix;

/// One extracted grid file, keyed by its embedded hour timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridFileEntry {
    pub timestamp: DateTime<Utc>,
    pub region_alias: String,
    pub path: PathBuf,
}

/// Every file registered for one timestamp, with its contributing regions
/// and the mirror archives they came from. The only feed into the assembler.
#[derive(Debug, Clone)]
pub struct TimestampGroup {
    pub timestamp: DateTime<Utc>,
    pub entries: Vec<GridFileEntry>,
    /// Mirror URIs of the archives that contributed files to this hour.
    pub member_uris: BTreeSet<String>,
}

impl TimestampGroup {
    pub fn region_aliases(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .map(|e| e.region_alias.clone())
            .collect()
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.entries.iter().map(|e| e.path.as_path()).collect()
    }
}

/// Parse the hour timestamp from a grid filename's fixed suffix.
///
/// Grid files end in `{YYYYMMDDHH}.nc4`, e.g.
/// `AORC_APCP_4KM_ABRFC_1979020100.nc4`. Returns `None` for anything else.
pub fn parse_grid_timestamp(filename: &str) -> Option<DateTime<Utc>> {
    let stem = filename.strip_suffix(".nc4")?;
    if stem.len() < 10 {
        return None;
    }
    let digits = &stem[stem.len() - 10..];
    parse_hour_suffix(digits).ok()
}

/// Timestamp-keyed index over one batch of extracted files.
///
/// Not a persistent store: built after the transfer phase completes and
/// discarded at batch end, so no locking is needed.
#[derive(Debug, Default)]
pub struct DatasetTracker {
    entries: BTreeMap<DateTime<Utc>, Vec<GridFileEntry>>,
    members: BTreeMap<DateTime<Utc>, BTreeSet<String>>,
}

impl DatasetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the extracted files of one regional archive.
    ///
    /// Files whose names do not carry the timestamp suffix are skipped with a
    /// warning and do not fail the rest of the batch; archives legitimately
    /// contain auxiliary, non-grid files. Returns the number of files
    /// registered.
    pub fn register(&mut self, region_alias: &str, mirror_uri: &str, paths: &[PathBuf]) -> usize {
        let mut registered = 0usize;
        for path in paths {
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                warn!(path = %path.display(), "skipping file with unreadable name");
                continue;
            };
            let Some(timestamp) = parse_grid_timestamp(filename) else {
                warn!(
                    region = %region_alias,
                    file = %filename,
                    "filename has no hour suffix, skipping"
                );
                continue;
            };

            self.entries.entry(timestamp).or_default().push(GridFileEntry {
                timestamp,
                region_alias: region_alias.to_string(),
                path: path.clone(),
            });
            self.members
                .entry(timestamp)
                .or_default()
                .insert(mirror_uri.to_string());
            registered += 1;
        }

        debug!(
            region = %region_alias,
            archive = %mirror_uri,
            registered = registered,
            skipped = paths.len() - registered,
            "archive files registered"
        );
        registered
    }

    /// Exact lookup of the entries for one hour.
    pub fn entries_for(&self, timestamp: DateTime<Utc>) -> &[GridFileEntry] {
        self.entries
            .get(&timestamp)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Every distinct timestamp with its files and contributing regions,
    /// ascending by timestamp.
    pub fn grouped(&self) -> impl Iterator<Item = TimestampGroup> + '_ {
        self.entries.iter().map(|(timestamp, entries)| TimestampGroup {
            timestamp: *timestamp,
            entries: entries.clone(),
            member_uris: self.members.get(timestamp).cloned().unwrap_or_default(),
        })
    }

    /// Number of distinct timestamps seen.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_grid_timestamp() {
        let ts = parse_grid_timestamp("AORC_APCP_4KM_ABRFC_1979020100.nc4").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(1979, 2, 1, 0, 0, 0).unwrap());

        assert!(parse_grid_timestamp("readme.txt").is_none());
        assert!(parse_grid_timestamp("AORC_APCP_4KM_ABRFC.nc4").is_none());
        assert!(parse_grid_timestamp("bad_1979023199.nc4").is_none());
    }

    #[test]
    fn test_siblings_group_by_hour() {
        let mut tracker = DatasetTracker::new();
        tracker.register(
            "AB",
            "s3://tempest/mirrors/ab.zip",
            &[PathBuf::from("/scratch/AORC_APCP_4KM_ABRFC_1979020100.nc4")],
        );
        tracker.register(
            "CN",
            "s3://tempest/mirrors/cn.zip",
            &[PathBuf::from("/scratch/AORC_APCP_4KM_CNRFC_1979020100.nc4")],
        );

        let groups: Vec<_> = tracker.grouped().collect();
        assert_eq!(groups.len(), 1);

        let group = &groups[0];
        assert_eq!(
            group.timestamp,
            Utc.with_ymd_and_hms(1979, 2, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            group.region_aliases(),
            ["AB", "CN"].iter().map(|s| s.to_string()).collect()
        );
        assert_eq!(group.entries.len(), 2);
        assert_eq!(group.member_uris.len(), 2);
    }

    #[test]
    fn test_auxiliary_files_skipped() {
        let mut tracker = DatasetTracker::new();
        let registered = tracker.register(
            "AB",
            "s3://tempest/mirrors/ab.zip",
            &[
                PathBuf::from("/scratch/AORC_APCP_4KM_ABRFC_1979020100.nc4"),
                PathBuf::from("/scratch/README"),
                PathBuf::from("/scratch/AORC_APCP_4KM_ABRFC_1979020101.nc4"),
            ],
        );

        assert_eq!(registered, 2);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_exact_lookup_and_ordering() {
        let mut tracker = DatasetTracker::new();
        tracker.register(
            "AB",
            "s3://tempest/mirrors/ab.zip",
            &[
                PathBuf::from("/scratch/AORC_APCP_4KM_ABRFC_1979020101.nc4"),
                PathBuf::from("/scratch/AORC_APCP_4KM_ABRFC_1979020100.nc4"),
            ],
        );

        let hour0 = Utc.with_ymd_and_hms(1979, 2, 1, 0, 0, 0).unwrap();
        let hour1 = Utc.with_ymd_and_hms(1979, 2, 1, 1, 0, 0).unwrap();
        let missing = Utc.with_ymd_and_hms(1980, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(tracker.entries_for(hour0).len(), 1);
        assert_eq!(tracker.entries_for(hour1).len(), 1);
        assert!(tracker.entries_for(missing).is_empty());

        // Groups come back ascending regardless of registration order.
        let timestamps: Vec<_> = tracker.grouped().map(|g| g.timestamp).collect();
        assert_eq!(timestamps, vec![hour0, hour1]);
    }
}
