//! Whole-batch test: two regions, a mocked host serving one month archive
//! per region with two hourly grids each, through transfer, extraction,
//! registration, and assembly.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};

use aorc_common::{ProvenanceInfo, RegionInfo};
use composite::ZarrCompression;
use mirror::SourceEnumerator;
use pipeline::config::PipelineConfig;
use pipeline::run::run_with_fetcher;
use storage::ObjectStorage;
use test_utils::{grid_filename, month_archive, write_regional_grid, FakeArchiveHost};

const BASE_URL: &str = "https://fake.host/pub/aorc-historic";

fn two_regions() -> Vec<RegionInfo> {
    vec![
        RegionInfo::new("AB", "ARKANSAS RED BASIN"),
        RegionInfo::new("CN", "CALIFORNIA NEVADA"),
    ]
}

fn test_config(scratch_dir: PathBuf) -> PipelineConfig {
    PipelineConfig {
        storage: Default::default(),
        regions: two_regions(),
        base_url: BASE_URL.to_string(),
        start_date: NaiveDate::from_ymd_opt(1979, 2, 1).unwrap(),
        end_date: Some(NaiveDate::from_ymd_opt(1979, 2, 1).unwrap()),
        mirror_prefix: "mirrors/aorc/precip".to_string(),
        composite_prefix: "composites/aorc/precip".to_string(),
        concurrency_limit: 5,
        max_retries: 3,
        request_timeout: Duration::from_secs(10),
        scratch_dir,
        provenance: ProvenanceInfo::new("registry/pipeline:test", "services/pipeline"),
        skip_existing: true,
        mirror_enabled: true,
        composite_enabled: true,
        zarr_chunk_size: 64,
        zarr_compression: ZarrCompression::None,
    }
}

/// One month archive per region, two hourly grids each, on disjoint lattices.
fn populate_host(host: &FakeArchiveHost, fixtures_dir: &std::path::Path) {
    let hours = [
        Utc.with_ymd_and_hms(1979, 2, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(1979, 2, 1, 1, 0, 0).unwrap(),
    ];
    let lattices = [("AB", [-100.0, -99.0]), ("CN", [-120.0, -119.0])];

    let enumerator = SourceEnumerator::new(
        two_regions(),
        BASE_URL,
        NaiveDate::from_ymd_opt(1979, 2, 1).unwrap(),
        Some(NaiveDate::from_ymd_opt(1979, 2, 1).unwrap()),
    );

    for locator in enumerator.locators() {
        let (_, lons) = lattices
            .iter()
            .find(|(alias, _)| *alias == locator.region_alias)
            .expect("known region");

        let mut members = Vec::new();
        for (hour_index, hour) in hours.iter().enumerate() {
            let name = grid_filename(&locator.region_alias, *hour);
            let nc_path = fixtures_dir.join(&name);
            let base = hour_index as f32 * 10.0;
            write_regional_grid(&nc_path, &[35.0], lons, &[base, base + 1.0]).unwrap();
            members.push((name, std::fs::read(&nc_path).unwrap()));
        }

        host.add_directory(&format!(
            "{}/{}/{}/",
            BASE_URL, locator.catalog_segment, locator.partition_segment
        ));
        host.add_archive(&locator.url, month_archive(&members));
    }
}

#[tokio::test]
async fn test_two_region_month_end_to_end() {
    let fixtures = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();

    let host = Arc::new(FakeArchiveHost::new());
    populate_host(&host, fixtures.path());

    let storage = Arc::new(ObjectStorage::new_in_memory("tempest"));
    let config = test_config(scratch.path().to_path_buf());

    let summary = run_with_fetcher(config, host.clone(), storage.clone())
        .await
        .unwrap();

    assert_eq!(summary.transferred, 2);
    assert_eq!(summary.extracted, 2);
    assert_eq!(summary.extract_failures, 0);
    assert_eq!(summary.assembled, 2);
    assert_eq!(summary.pending, 0);
    assert_eq!(summary.failed_timestamps, 0);

    // One composite per hour, each built from both regions' archives.
    assert_eq!(summary.composites.len(), 2);
    let mut timestamps: Vec<_> = summary.composites.iter().map(|c| c.start_time).collect();
    timestamps.sort();
    assert_eq!(
        timestamps,
        vec![
            Utc.with_ymd_and_hms(1979, 2, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(1979, 2, 1, 1, 0, 0).unwrap(),
        ]
    );
    for record in &summary.composites {
        assert_eq!(record.members.len(), 2);
        assert_eq!(record.end_time, record.start_time + chrono::Duration::hours(1));
    }

    // The composite stores and their record metadata landed in the bucket.
    let keys = storage
        .list("composites/aorc/precip/1979/1979020100.zarr")
        .await
        .unwrap();
    assert!(!keys.is_empty());
    let meta = storage.metadata(&keys[0]).await.unwrap();
    assert!(meta["members"].contains("ABRFC"));
    assert!(meta["members"].contains("CNRFC"));
}

#[tokio::test]
async fn test_rerun_skips_mirrored_archives_and_composite_only_resumes() {
    let fixtures = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();

    let host = Arc::new(FakeArchiveHost::new());
    populate_host(&host, fixtures.path());

    let storage = Arc::new(ObjectStorage::new_in_memory("tempest"));

    let first = run_with_fetcher(
        test_config(scratch.path().to_path_buf()),
        host.clone(),
        storage.clone(),
    )
    .await
    .unwrap();
    assert_eq!(first.transferred, 2);

    // A rerun pre-filters every already-mirrored destination.
    let second = run_with_fetcher(
        test_config(scratch.path().to_path_buf()),
        host.clone(),
        storage.clone(),
    )
    .await
    .unwrap();
    assert_eq!(second.transferred, 0);
    assert_eq!(second.skipped_existing, 2);

    // A composite-only run rediscovers the mirrored archives from their
    // object metadata and deterministically rebuilds both composites.
    let mut composite_only = test_config(scratch.path().to_path_buf());
    composite_only.mirror_enabled = false;
    let third = run_with_fetcher(composite_only, host, storage)
        .await
        .unwrap();
    assert_eq!(third.extracted, 2);
    assert_eq!(third.assembled, 2);
    assert_eq!(third.failed_timestamps, 0);
}
