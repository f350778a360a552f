//! Bounded-concurrency transfer of source archives into blob storage.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use aorc_common::ProvenanceInfo;
use storage::{ObjectStorage, StoragePath};

use crate::enumerate::SourceLocator;
use crate::error::{MirrorError, MirrorResult};
use crate::fetch::{ArchiveFetcher, FetchError, FetchedArchive};

/// Configuration for the transfer engine.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Maximum simultaneous in-flight transfers.
    pub concurrency_limit: usize,
    /// Retry budget per locator for transient disconnects.
    pub max_retries: u32,
    /// Fixed sleep between retries.
    pub retry_backoff: Duration,
    /// Destination key prefix in the bucket.
    pub destination_prefix: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 5,
            max_retries: 3,
            retry_backoff: Duration::from_secs(3),
            destination_prefix: "mirrors/aorc/precip".to_string(),
        }
    }
}

/// Provenance record for one successful transfer.
///
/// Created at most once per (region, month) per run and attached verbatim as
/// destination-object metadata; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub region_alias: String,
    pub region_name: String,
    pub ref_month: NaiveDate,
    pub source_uri: String,
    /// Key of the mirrored object within the bucket.
    pub mirror_key: String,
    /// Full `s3://` URI of the mirrored object.
    pub mirror_uri: String,
    pub source_bytes: u64,
    pub source_last_modified: Option<DateTime<Utc>>,
    pub docker_image: String,
    pub mirror_script: String,
}

impl TransferRecord {
    /// Serialize to the string-keyed map written as object metadata.
    pub fn to_metadata(&self) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::new();
        meta.insert("source_uri".to_string(), self.source_uri.clone());
        meta.insert("mirror_uri".to_string(), self.mirror_uri.clone());
        meta.insert(
            "ref_date".to_string(),
            self.ref_month.format("%Y-%m-%d").to_string(),
        );
        meta.insert("region_alias".to_string(), self.region_alias.clone());
        meta.insert("region_name".to_string(), self.region_name.clone());
        meta.insert("source_bytes".to_string(), self.source_bytes.to_string());
        meta.insert(
            "source_last_modified".to_string(),
            self.source_last_modified
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default(),
        );
        meta.insert("docker_image".to_string(), self.docker_image.clone());
        meta.insert("mirror_script".to_string(), self.mirror_script.clone());
        meta
    }
}

/// Copies archives from the host into blob storage through a bounded pool.
pub struct TransferEngine<F: ArchiveFetcher> {
    fetcher: Arc<F>,
    storage: Arc<ObjectStorage>,
    provenance: ProvenanceInfo,
    config: TransferConfig,
}

impl<F: ArchiveFetcher> TransferEngine<F> {
    pub fn new(
        fetcher: Arc<F>,
        storage: Arc<ObjectStorage>,
        provenance: ProvenanceInfo,
        config: TransferConfig,
    ) -> Self {
        Self {
            fetcher,
            storage,
            provenance,
            config,
        }
    }

    /// Transfer every locator, at most `concurrency_limit` in flight at once.
    ///
    /// A locator that exhausts its retries is dropped from the results without
    /// affecting its siblings. Completion order is unspecified. A timeout
    /// aborts the whole batch; in-flight siblings are cancelled.
    ///
    /// There is no cross-run dedup here: callers resuming a partial run must
    /// pre-filter locators whose destination object already exists.
    pub async fn transfer_all(
        &self,
        locators: impl IntoIterator<Item = SourceLocator>,
    ) -> MirrorResult<Vec<TransferRecord>> {
        let mut in_flight = stream::iter(
            locators
                .into_iter()
                .map(|locator| self.transfer_one(locator)),
        )
        .buffer_unordered(self.config.concurrency_limit.max(1));

        let mut records = Vec::new();
        let mut dropped = 0usize;
        while let Some(outcome) = in_flight.next().await {
            match outcome {
                Ok(Some(record)) => records.push(record),
                Ok(None) => dropped += 1,
                Err(e) => return Err(e),
            }
        }

        info!(
            transferred = records.len(),
            dropped = dropped,
            "transfer batch complete"
        );
        Ok(records)
    }

    /// Transfer one locator. `Ok(None)` means the locator was dropped.
    #[instrument(skip(self, locator), fields(url = %locator.url))]
    async fn transfer_one(&self, locator: SourceLocator) -> MirrorResult<Option<TransferRecord>> {
        let mut attempts = 0u32;
        let fetched = loop {
            match self.fetcher.fetch(&locator.url).await {
                Ok(fetched) => break fetched,
                Err(FetchError::Disconnected { url, message }) => {
                    attempts += 1;
                    if attempts >= self.config.max_retries {
                        warn!(
                            url = %url,
                            attempts = attempts,
                            "retries exhausted, dropping locator"
                        );
                        return Ok(None);
                    }
                    warn!(
                        url = %url,
                        error = %message,
                        attempt = attempts,
                        max_retries = self.config.max_retries,
                        backoff_secs = self.config.retry_backoff.as_secs(),
                        "disconnected, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(FetchError::Timeout { url }) => {
                    return Err(MirrorError::Timeout(url));
                }
                Err(FetchError::Status { url, status }) => {
                    warn!(url = %url, status = status, "source unavailable, dropping locator");
                    return Ok(None);
                }
                Err(FetchError::Io { source, .. }) => {
                    return Err(MirrorError::Io(source));
                }
            }
        };

        let record = self.upload(&locator, fetched).await?;
        Ok(Some(record))
    }

    async fn upload(
        &self,
        locator: &SourceLocator,
        fetched: FetchedArchive,
    ) -> MirrorResult<TransferRecord> {
        let mirror_key = StoragePath::mirror_archive(
            &self.config.destination_prefix,
            &locator.catalog_segment,
            &locator.partition_segment,
            &locator.filename,
        );
        let record = TransferRecord {
            region_alias: locator.region_alias.clone(),
            region_name: locator.region_name.clone(),
            ref_month: locator.ref_month,
            source_uri: locator.url.clone(),
            mirror_uri: self.storage.uri(&mirror_key),
            mirror_key,
            source_bytes: fetched.bytes,
            source_last_modified: fetched.last_modified,
            docker_image: self.provenance.docker_image.clone(),
            mirror_script: self.provenance.script_path.clone(),
        };

        // Body is already fully buffered; a failed fetch never reaches here.
        let body = tokio::fs::read(&fetched.path).await?;
        self.storage
            .put_with_metadata(&record.mirror_key, Bytes::from(body), &record.to_metadata())
            .await?;
        tokio::fs::remove_file(&fetched.path).await.ok();

        info!(
            source = %record.source_uri,
            mirror = %record.mirror_uri,
            bytes = record.source_bytes,
            "archive mirrored"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_metadata_fields() {
        let record = TransferRecord {
            region_alias: "AB".to_string(),
            region_name: "ARKANSAS RED BASIN".to_string(),
            ref_month: NaiveDate::from_ymd_opt(1979, 2, 1).unwrap(),
            source_uri: "https://host/a.zip".to_string(),
            mirror_key: "mirrors/a.zip".to_string(),
            mirror_uri: "s3://tempest/mirrors/a.zip".to_string(),
            source_bytes: 42,
            source_last_modified: None,
            docker_image: "registry/image:tag".to_string(),
            mirror_script: "services/pipeline".to_string(),
        };

        let meta = record.to_metadata();
        assert_eq!(meta["ref_date"], "1979-02-01");
        assert_eq!(meta["source_bytes"], "42");
        assert_eq!(meta["source_last_modified"], "");
        assert_eq!(meta["mirror_uri"], "s3://tempest/mirrors/a.zip");
        assert_eq!(meta.len(), 9);
    }
}
