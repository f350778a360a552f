//! Batch orchestration: verify → enumerate → pre-filter → transfer →
//! extract → register → assemble.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use composite::{AssembleOutcome, CompositeAssembler, CompositeRecord, DatasetTracker};
use mirror::{
    ArchiveExtractor, ArchiveFetcher, HttpFetcher, SourceEnumerator, TransferEngine,
    TransferRecord,
};
use storage::{ObjectStorage, StoragePath};

use crate::config::PipelineConfig;

/// Counts and records from one batch.
#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub transferred: usize,
    pub skipped_existing: usize,
    pub extracted: usize,
    pub extract_failures: usize,
    pub assembled: usize,
    pub pending: usize,
    pub failed_timestamps: usize,
    pub transfers: Vec<TransferRecord>,
    pub composites: Vec<CompositeRecord>,
}

/// Run one batch with the production HTTP fetcher and S3 storage.
pub async fn run(config: PipelineConfig) -> Result<PipelineSummary> {
    let storage = Arc::new(ObjectStorage::new(&config.storage)?);
    let fetcher = Arc::new(HttpFetcher::new(
        config.scratch_dir.join("downloads"),
        config.request_timeout,
    )?);
    run_with_fetcher(config, fetcher, storage).await
}

/// Run one batch against injected transport and storage.
///
/// Independent year-ranges can be farmed to separate OS processes by running
/// this binary with disjoint date ranges; nothing here shares mutable state
/// across processes.
pub async fn run_with_fetcher<F: ArchiveFetcher + 'static>(
    config: PipelineConfig,
    fetcher: Arc<F>,
    storage: Arc<ObjectStorage>,
) -> Result<PipelineSummary> {
    let mut summary = PipelineSummary::default();
    let mut records: Vec<TransferRecord> = Vec::new();

    if config.mirror_enabled {
        let enumerator = SourceEnumerator::new(
            config.regions.clone(),
            config.base_url.clone(),
            config.start_date,
            config.end_date,
        );

        // Fail the whole run before any transfer if the layout is wrong.
        enumerator.verify_layout(fetcher.as_ref()).await?;

        // The engine has no cross-run dedup; resuming a partial run means
        // pre-filtering locators whose destination already exists.
        let mut locators = Vec::new();
        for locator in enumerator.locators() {
            if config.skip_existing {
                let key = StoragePath::mirror_archive(
                    &config.mirror_prefix,
                    &locator.catalog_segment,
                    &locator.partition_segment,
                    &locator.filename,
                );
                if storage.exists(&key).await? {
                    debug!(url = %locator.url, "destination already mirrored, skipping");
                    summary.skipped_existing += 1;
                    continue;
                }
            }
            locators.push(locator);
        }

        let engine = TransferEngine::new(
            fetcher.clone(),
            storage.clone(),
            config.provenance.clone(),
            config.transfer_config(),
        );
        records = engine.transfer_all(locators).await?;
        summary.transferred = records.len();
    }

    if config.composite_enabled {
        if !config.mirror_enabled {
            records = discover_mirrored_archives(&storage, &config.mirror_prefix).await?;
            info!(
                count = records.len(),
                "discovered mirrored archives for composite-only run"
            );
        }

        let extractor = ArchiveExtractor::new(storage.clone(), config.scratch_dir.join("extracted"));
        let mut tracker = DatasetTracker::new();

        // Registration starts only after the transfer phase is done, so the
        // tracker needs no locking.
        for record in &records {
            match extractor.extract(record).await {
                Ok(extracted) => {
                    summary.extracted += 1;
                    tracker.register(
                        &extracted.region_alias,
                        &extracted.mirror_uri,
                        &extracted.paths,
                    );
                }
                Err(e) => {
                    error!(
                        archive = %record.mirror_uri,
                        error = %e,
                        "extraction failed, skipping archive"
                    );
                    summary.extract_failures += 1;
                }
            }
        }

        let assembler = CompositeAssembler::new(
            storage.clone(),
            config.provenance.clone(),
            config.assembler_config(),
        );
        for group in tracker.grouped() {
            match assembler.assemble(&group).await {
                Ok(AssembleOutcome::Assembled(record)) => {
                    summary.assembled += 1;
                    summary.composites.push(record);
                }
                Ok(AssembleOutcome::Pending(_)) => {
                    summary.pending += 1;
                }
                Err(e) => {
                    error!(
                        timestamp = %group.timestamp,
                        error = %e,
                        "assembly failed, rerun required for this timestamp"
                    );
                    summary.failed_timestamps += 1;
                }
            }
        }
    }

    summary.transfers = records;

    info!(
        transferred = summary.transferred,
        skipped_existing = summary.skipped_existing,
        extracted = summary.extracted,
        extract_failures = summary.extract_failures,
        assembled = summary.assembled,
        pending = summary.pending,
        failed = summary.failed_timestamps,
        "pipeline batch complete"
    );

    Ok(summary)
}

/// Rebuild transfer records from the metadata of already-mirrored objects.
async fn discover_mirrored_archives(
    storage: &ObjectStorage,
    mirror_prefix: &str,
) -> Result<Vec<TransferRecord>> {
    let mut records = Vec::new();

    for key in storage.list(mirror_prefix).await? {
        if !key.ends_with(".zip") {
            continue;
        }
        let meta = storage.metadata(&key).await?;

        let Some(alias) = meta.get("region_alias") else {
            warn!(key = %key, "mirrored object carries no region metadata, skipping");
            continue;
        };
        let ref_month = meta
            .get("ref_date")
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .unwrap_or_else(aorc_common::first_record_date);

        records.push(TransferRecord {
            region_alias: alias.clone(),
            region_name: meta.get("region_name").cloned().unwrap_or_default(),
            ref_month,
            source_uri: meta.get("source_uri").cloned().unwrap_or_default(),
            mirror_uri: meta
                .get("mirror_uri")
                .cloned()
                .unwrap_or_else(|| storage.uri(&key)),
            mirror_key: key,
            source_bytes: meta
                .get("source_bytes")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            source_last_modified: meta
                .get("source_last_modified")
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            docker_image: meta.get("docker_image").cloned().unwrap_or_default(),
            mirror_script: meta.get("mirror_script").cloned().unwrap_or_default(),
        });
    }

    Ok(records)
}
