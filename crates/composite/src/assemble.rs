//! Completeness-gated assembly of timestamp groups into composite stores.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use aorc_common::time::hour_key;
use aorc_common::{default_regions, ProvenanceInfo};
use storage::{ObjectStorage, StoragePath};

use crate::error::{CompositeError, CompositeResult};
use crate::grid::{load_regional_grid, RegionalGrid};
use crate::merge::merge_grids;
use crate::tracker::TimestampGroup;
use crate::zarr::{write_composite_store, CompositeWriterConfig};

/// Configuration for the assembler.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// The exact set of region aliases a complete hour must have.
    pub expected_regions: BTreeSet<String>,
    /// Destination key prefix for composite stores.
    pub composite_prefix: String,
    /// Local directory where stores are staged before upload.
    pub scratch_dir: PathBuf,
    pub writer: CompositeWriterConfig,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            expected_regions: default_regions().into_iter().map(|r| r.alias).collect(),
            composite_prefix: "composites/aorc/precip".to_string(),
            scratch_dir: std::env::temp_dir().join("aorc-composites"),
            writer: CompositeWriterConfig::default(),
        }
    }
}

/// Record attached to every composite write.
///
/// Created only when the completeness gate holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeRecord {
    pub start_time: DateTime<Utc>,
    /// Always `start_time` + 1 hour.
    pub end_time: DateTime<Utc>,
    /// Mirror URIs of the member archives.
    pub members: BTreeSet<String>,
    pub composite_uri: String,
    pub docker_image: String,
    pub composite_script: String,
}

impl CompositeRecord {
    /// Serialize to the string-keyed map written as object metadata.
    /// Members are delimited with commas.
    pub fn to_metadata(&self) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::new();
        meta.insert("start_time".to_string(), self.start_time.to_rfc3339());
        meta.insert("end_time".to_string(), self.end_time.to_rfc3339());
        meta.insert(
            "members".to_string(),
            self.members.iter().cloned().collect::<Vec<_>>().join(","),
        );
        meta.insert("composite_uri".to_string(), self.composite_uri.clone());
        meta.insert("docker_image".to_string(), self.docker_image.clone());
        meta.insert(
            "composite_script".to_string(),
            self.composite_script.clone(),
        );
        meta
    }

    /// The same fields as JSON attributes for the store's group metadata.
    pub fn to_attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut attrs = serde_json::Map::new();
        for (key, value) in self.to_metadata() {
            attrs.insert(key, serde_json::json!(value));
        }
        attrs
    }
}

/// An hour that is registered but not yet complete. Not an error: a later
/// transfer pass may still fill in the missing regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletenessShortfall {
    pub timestamp: DateTime<Utc>,
    pub present: BTreeSet<String>,
    pub missing: BTreeSet<String>,
}

/// Outcome of assembling one timestamp group.
#[derive(Debug, Clone)]
pub enum AssembleOutcome {
    Assembled(CompositeRecord),
    Pending(CompletenessShortfall),
}

/// Merges a timestamp's files into one composite once every expected region
/// has arrived.
pub struct CompositeAssembler {
    storage: Arc<ObjectStorage>,
    provenance: ProvenanceInfo,
    config: AssemblerConfig,
}

impl CompositeAssembler {
    pub fn new(
        storage: Arc<ObjectStorage>,
        provenance: ProvenanceInfo,
        config: AssemblerConfig,
    ) -> Self {
        Self {
            storage,
            provenance,
            config,
        }
    }

    /// Check the completeness gate: the contributing alias set must exactly
    /// equal the expected set. Returns the shortfall when it does not.
    pub fn completeness(&self, group: &TimestampGroup) -> Option<CompletenessShortfall> {
        let present = group.region_aliases();
        if present == self.config.expected_regions {
            return None;
        }

        let missing: BTreeSet<String> = self
            .config
            .expected_regions
            .difference(&present)
            .cloned()
            .collect();
        let unexpected: BTreeSet<String> =
            present.difference(&self.config.expected_regions).cloned().collect();
        if !unexpected.is_empty() {
            warn!(
                timestamp = %group.timestamp,
                regions = ?unexpected,
                "group contains regions outside the expected set"
            );
        }

        Some(CompletenessShortfall {
            timestamp: group.timestamp,
            present,
            missing,
        })
    }

    /// Assemble one timestamp group.
    ///
    /// An incomplete group is skipped, not failed. Merge conflicts and write
    /// failures are fatal for this one timestamp and require an
    /// operator-triggered rerun; nothing already written is rolled back.
    #[instrument(skip(self, group), fields(timestamp = %group.timestamp))]
    pub async fn assemble(&self, group: &TimestampGroup) -> CompositeResult<AssembleOutcome> {
        if let Some(shortfall) = self.completeness(group) {
            info!(
                present = shortfall.present.len(),
                expected = self.config.expected_regions.len(),
                missing = ?shortfall.missing,
                "group incomplete, composite pending"
            );
            return Ok(AssembleOutcome::Pending(shortfall));
        }

        let mut grids = Vec::with_capacity(group.entries.len());
        for entry in &group.entries {
            grids.push(load_regional_grid(&entry.path, &entry.region_alias)?);
        }

        let record = self
            .assemble_from_grids(group.timestamp, &grids, &group.member_uris)
            .await?;
        Ok(AssembleOutcome::Assembled(record))
    }

    /// Merge loaded grids and write the composite store. Split out from
    /// [`assemble`](Self::assemble) so the merge-and-write path can be driven
    /// without NetCDF files on disk.
    pub async fn assemble_from_grids(
        &self,
        timestamp: DateTime<Utc>,
        grids: &[RegionalGrid],
        members: &BTreeSet<String>,
    ) -> CompositeResult<CompositeRecord> {
        let merged = merge_grids(grids)?;

        let key = StoragePath::composite_store(&self.config.composite_prefix, timestamp);
        let record = CompositeRecord {
            start_time: timestamp,
            end_time: timestamp + Duration::hours(1),
            members: members.clone(),
            composite_uri: self.storage.uri(&key),
            docker_image: self.provenance.docker_image.clone(),
            composite_script: self.provenance.script_path.clone(),
        };

        let local = self
            .config
            .scratch_dir
            .join(format!("{}.zarr", hour_key(timestamp)));
        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;

        let bytes_written =
            write_composite_store(&local, &merged, record.to_attributes(), &self.config.writer)?;

        let uploaded =
            upload_store_directory(&self.storage, &local, &key, &record.to_metadata()).await?;

        info!(
            composite = %record.composite_uri,
            members = record.members.len(),
            grid = format!("{}x{}", merged.lats.len(), merged.lons.len()),
            bytes = bytes_written,
            objects = uploaded,
            "composite assembled"
        );

        Ok(record)
    }
}

/// Upload a local store directory file-by-file under `storage_prefix`,
/// attaching the record metadata to every object. Returns the object count.
async fn upload_store_directory(
    storage: &ObjectStorage,
    local_path: &Path,
    storage_prefix: &str,
    metadata: &BTreeMap<String, String>,
) -> CompositeResult<usize> {
    let mut uploaded = 0usize;

    for entry in walkdir::WalkDir::new(local_path) {
        let entry = entry.map_err(|e| CompositeError::StorageUpload(e.to_string()))?;

        if entry.file_type().is_file() {
            let relative_path = entry
                .path()
                .strip_prefix(local_path)
                .map_err(|e| CompositeError::StorageUpload(e.to_string()))?;

            let storage_path = format!("{}/{}", storage_prefix, relative_path.display());

            let file_data = tokio::fs::read(entry.path()).await?;
            storage
                .put_with_metadata(&storage_path, Bytes::from(file_data), metadata)
                .await
                .map_err(|e| CompositeError::StorageUpload(e.to_string()))?;

            uploaded += 1;
        }
    }

    Ok(uploaded)
}
