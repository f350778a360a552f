//! Path builder for consistent storage layout.
//!
//! Mirror keys reproduce the source URL path suffix under the destination
//! prefix, so the layout verified against the archive host carries over to
//! the bucket unchanged.

use chrono::{DateTime, Datelike, Utc};

use aorc_common::time::hour_key;

pub struct StoragePath;

impl StoragePath {
    /// Key for a mirrored monthly archive.
    /// Format: {prefix}/{catalog}/{partition}/{filename}
    pub fn mirror_archive(prefix: &str, catalog: &str, partition: &str, filename: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            prefix.trim_end_matches('/'),
            catalog,
            partition,
            filename
        )
    }

    /// Key prefix for a composite store, partitioned by year and full timestamp.
    /// Format: {prefix}/{year}/{YYYYMMDDHH}.zarr
    pub fn composite_store(prefix: &str, timestamp: DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}.zarr",
            prefix.trim_end_matches('/'),
            timestamp.year(),
            hour_key(timestamp)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_storage_paths() {
        assert_eq!(
            StoragePath::mirror_archive(
                "mirrors/aorc/precip",
                "AORC_ABRFC_4km",
                "ABRFC_precip_partition",
                "AORC_APCP_4KM_ABRFC_197902.zip"
            ),
            "mirrors/aorc/precip/AORC_ABRFC_4km/ABRFC_precip_partition/AORC_APCP_4KM_ABRFC_197902.zip"
        );

        let ts = Utc.with_ymd_and_hms(1979, 2, 1, 5, 0, 0).unwrap();
        assert_eq!(
            StoragePath::composite_store("composites/aorc/precip/", ts),
            "composites/aorc/precip/1979/1979020105.zarr"
        );
    }
}
