//! Pipeline configuration: storage credentials from the environment, the
//! region list from YAML (defaulting to the built-in 12 RFCs), and the
//! per-component knobs injected into each constructor.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info};

use aorc_common::{default_regions, ProvenanceInfo, RegionInfo};
use composite::{AssemblerConfig, CompositeWriterConfig, ZarrCompression};
use mirror::TransferConfig;
use storage::ObjectStorageConfig;

/// Top-level pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub storage: ObjectStorageConfig,
    pub regions: Vec<RegionInfo>,
    /// Archive host base URL.
    pub base_url: String,
    pub start_date: NaiveDate,
    /// Defaults to today when not given.
    pub end_date: Option<NaiveDate>,
    pub mirror_prefix: String,
    pub composite_prefix: String,
    pub concurrency_limit: usize,
    pub max_retries: u32,
    pub request_timeout: Duration,
    /// Scratch directory for downloads, extracted files, and staged stores.
    pub scratch_dir: PathBuf,
    pub provenance: ProvenanceInfo,
    /// Pre-filter locators whose destination object already exists.
    pub skip_existing: bool,
    /// Run the transfer phase.
    pub mirror_enabled: bool,
    /// Run the extract/assemble phase.
    pub composite_enabled: bool,
    pub zarr_chunk_size: usize,
    pub zarr_compression: ZarrCompression,
}

impl PipelineConfig {
    /// Object storage settings from the environment, MinIO defaults.
    pub fn storage_from_env() -> ObjectStorageConfig {
        ObjectStorageConfig {
            endpoint: env::var("S3_ENDPOINT").unwrap_or_else(|_| "http://minio:9000".to_string()),
            bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "tempest".to_string()),
            access_key_id: env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string()),
            secret_access_key: env::var("S3_SECRET_KEY")
                .unwrap_or_else(|_| "minioadmin".to_string()),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            allow_http: env::var("S3_ALLOW_HTTP")
                .map(|v| v == "true")
                .unwrap_or(true),
        }
    }

    /// The transfer engine's slice of this config.
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            concurrency_limit: self.concurrency_limit,
            max_retries: self.max_retries,
            destination_prefix: self.mirror_prefix.clone(),
            ..Default::default()
        }
    }

    /// The assembler's slice of this config. The expected-region set is the
    /// configured region list: completeness means every configured region.
    pub fn assembler_config(&self) -> AssemblerConfig {
        AssemblerConfig {
            expected_regions: self.regions.iter().map(|r| r.alias.clone()).collect(),
            composite_prefix: self.composite_prefix.clone(),
            scratch_dir: self.scratch_dir.join("composites"),
            writer: CompositeWriterConfig {
                chunk_size: self.zarr_chunk_size,
                compression: self.zarr_compression,
                ..Default::default()
            },
        }
    }
}

/// Region list file layout.
#[derive(Debug, Deserialize)]
struct RegionsFile {
    regions: Vec<RegionEntry>,
}

#[derive(Debug, Deserialize)]
struct RegionEntry {
    alias: String,
    name: String,
}

/// Load regions from a YAML file, or fall back to the built-in registry.
pub fn load_regions(path: Option<&Path>) -> Result<Vec<RegionInfo>> {
    let Some(path) = path else {
        debug!("no regions file given, using built-in RFC registry");
        return Ok(default_regions());
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read regions file: {}", path.display()))?;

    let parsed: RegionsFile = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse regions file: {}", path.display()))?;

    anyhow::ensure!(
        !parsed.regions.is_empty(),
        "regions file {} lists no regions",
        path.display()
    );

    let regions: Vec<RegionInfo> = parsed
        .regions
        .into_iter()
        .map(|entry| RegionInfo::new(entry.alias, entry.name))
        .collect();

    info!(count = regions.len(), path = %path.display(), "Loaded region list");
    Ok(regions)
}
