//! Derivation of candidate source locations from a region list and date range.
//!
//! If the assumed host layout is wrong every derived URL is wrong, so the
//! enumerator probes each region's catalog directory once and fails the whole
//! run before generating anything.

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use aorc_common::time::month_range;
use aorc_common::RegionInfo;

use crate::error::{MirrorError, MirrorResult};
use crate::fetch::ArchiveFetcher;

/// A fully resolved description of one source archive's remote location.
///
/// Immutable; created only by [`SourceEnumerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocator {
    pub region_alias: String,
    pub region_name: String,
    /// First day of the reference month.
    pub ref_month: NaiveDate,
    pub catalog_segment: String,
    pub partition_segment: String,
    pub filename: String,
    /// Composed absolute URL on the archive host.
    pub url: String,
}

impl SourceLocator {
    /// Relative path suffix mirrored under the destination prefix.
    pub fn storage_suffix(&self) -> String {
        format!(
            "{}/{}/{}",
            self.catalog_segment, self.partition_segment, self.filename
        )
    }
}

/// Enumerates one locator per (region, month) across a date range.
pub struct SourceEnumerator {
    regions: Vec<RegionInfo>,
    base_url: String,
    start: NaiveDate,
    end: NaiveDate,
}

impl SourceEnumerator {
    /// `end` defaults to today when not given.
    pub fn new(
        regions: Vec<RegionInfo>,
        base_url: impl Into<String>,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Self {
        Self {
            regions,
            base_url: base_url.into(),
            start,
            end: end.unwrap_or_else(|| Utc::now().date_naive()),
        }
    }

    fn directory_url(&self, region: &RegionInfo) -> String {
        format!(
            "{}/{}/{}/",
            self.base_url.trim_end_matches('/'),
            region.catalog_segment(),
            region.partition_segment()
        )
    }

    /// Probe each region's catalog directory on the host.
    ///
    /// Any failed probe is fatal for the whole run: no transfers may start
    /// against an unverified layout.
    pub async fn verify_layout<F: ArchiveFetcher + ?Sized>(&self, fetcher: &F) -> MirrorResult<()> {
        for region in &self.regions {
            let url = self.directory_url(region);
            fetcher.probe(&url).await.map_err(|e| {
                MirrorError::Structure(format!(
                    "catalog directory probe failed for region {}: {}",
                    region.alias, e
                ))
            })?;
            debug!(region = %region.alias, url = %url, "catalog directory verified");
        }
        info!(
            regions = self.regions.len(),
            "expected directory structure of archive host verified"
        );
        Ok(())
    }

    /// Lazy, finite, restartable sequence of locators: region-major, then
    /// month-ascending within each region.
    pub fn locators(&self) -> impl Iterator<Item = SourceLocator> + '_ {
        let months = month_range(self.start, self.end);
        self.regions.iter().flat_map(move |region| {
            months
                .clone()
                .into_iter()
                .map(move |month| self.locator_for(region, month))
        })
    }

    fn locator_for(&self, region: &RegionInfo, month: NaiveDate) -> SourceLocator {
        let catalog_segment = region.catalog_segment();
        let partition_segment = region.partition_segment();
        let filename = region.archive_filename(month);
        let url = format!(
            "{}/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            catalog_segment,
            partition_segment,
            filename
        );
        SourceLocator {
            region_alias: region.alias.clone(),
            region_name: region.name.clone(),
            ref_month: month,
            catalog_segment,
            partition_segment,
            filename,
            url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_regions() -> Vec<RegionInfo> {
        vec![
            RegionInfo::new("AB", "ARKANSAS RED BASIN"),
            RegionInfo::new("CN", "CALIFORNIA NEVADA"),
        ]
    }

    #[test]
    fn test_one_locator_per_region_month() {
        let start = NaiveDate::from_ymd_opt(1979, 2, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(1979, 4, 1).unwrap();
        let enumerator = SourceEnumerator::new(
            two_regions(),
            "https://host.example/pub/aorc-historic",
            start,
            Some(end),
        );

        let locators: Vec<_> = enumerator.locators().collect();
        assert_eq!(locators.len(), 6); // 2 regions x 3 months

        // Region-major ordering: all AB months precede all CN months.
        assert!(locators[..3].iter().all(|l| l.region_alias == "AB"));
        assert!(locators[3..].iter().all(|l| l.region_alias == "CN"));

        // Month-ascending within a region.
        assert!(locators[0].ref_month < locators[1].ref_month);
        assert!(locators[1].ref_month < locators[2].ref_month);
    }

    #[test]
    fn test_url_composition() {
        let start = NaiveDate::from_ymd_opt(1979, 2, 1).unwrap();
        let enumerator = SourceEnumerator::new(
            two_regions(),
            "https://host.example/pub/aorc-historic/",
            start,
            Some(start),
        );

        let first = enumerator.locators().next().unwrap();
        assert_eq!(
            first.url,
            "https://host.example/pub/aorc-historic/AORC_ABRFC_4km/ABRFC_precip_partition/AORC_APCP_4KM_ABRFC_197902.zip"
        );
        assert_eq!(
            first.storage_suffix(),
            "AORC_ABRFC_4km/ABRFC_precip_partition/AORC_APCP_4KM_ABRFC_197902.zip"
        );
    }

    #[test]
    fn test_restartable() {
        let start = NaiveDate::from_ymd_opt(1979, 2, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(1979, 3, 1).unwrap();
        let enumerator =
            SourceEnumerator::new(two_regions(), "https://host.example", start, Some(end));

        let first_pass: Vec<_> = enumerator.locators().collect();
        let second_pass: Vec<_> = enumerator.locators().collect();
        assert_eq!(first_pass, second_pass);
    }
}
