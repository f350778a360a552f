//! AORC mirror-and-composite pipeline binary.
//!
//! Mirrors monthly precipitation archives from the NOAA AORC host into
//! blob storage, then assembles per-hour national composites from the
//! regions' extracted grid files:
//! - Layout probe before any transfer
//! - Bounded-concurrency transfers with retry and provenance metadata
//! - Completeness-gated, idempotent composite assembly

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use aorc_common::ProvenanceInfo;
use composite::ZarrCompression;
use pipeline::config::{load_regions, PipelineConfig};
use pipeline::run::run;

#[derive(Parser, Debug)]
#[command(name = "pipeline")]
#[command(about = "AORC mirror-and-composite pipeline")]
struct Args {
    /// First month to process (YYYY-MM-DD)
    #[arg(long, default_value = "1979-02-01")]
    start_date: NaiveDate,

    /// Last month to process (defaults to today)
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Regions YAML file (defaults to the built-in 12 RFCs)
    #[arg(long)]
    regions_file: Option<PathBuf>,

    /// Archive host base URL
    #[arg(
        long,
        env = "AORC_BASE_URL",
        default_value = "https://hydrology.nws.noaa.gov/pub/aorc-historic"
    )]
    base_url: String,

    /// Destination prefix for mirrored archives
    #[arg(long, default_value = "mirrors/aorc/precip")]
    mirror_prefix: String,

    /// Destination prefix for composite stores
    #[arg(long, default_value = "composites/aorc/precip")]
    composite_prefix: String,

    /// Maximum simultaneous transfers
    #[arg(long, default_value = "5")]
    concurrency: usize,

    /// Retry budget per locator for transient disconnects
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "600")]
    request_timeout_secs: u64,

    /// Directory for downloads, extracted files, and staged stores
    #[arg(long, default_value = "/tmp/aorc-pipeline")]
    scratch_dir: PathBuf,

    /// Re-transfer archives whose destination already exists
    #[arg(long)]
    force: bool,

    /// Only mirror; skip extraction and assembly
    #[arg(long, conflicts_with = "composite_only")]
    mirror_only: bool,

    /// Only assemble, from already-mirrored archives
    #[arg(long)]
    composite_only: bool,

    /// Chunk dimension for composite stores
    #[arg(long, default_value = "512")]
    zarr_chunk_size: usize,

    /// Composite compression: none, blosc-lz4, blosc-zstd
    #[arg(long, default_value = "blosc-zstd")]
    zarr_compression: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting AORC pipeline");

    tokio::fs::create_dir_all(&args.scratch_dir).await?;

    let regions = load_regions(args.regions_file.as_deref())?;

    let config = PipelineConfig {
        storage: PipelineConfig::storage_from_env(),
        regions,
        base_url: args.base_url,
        start_date: args.start_date,
        end_date: args.end_date,
        mirror_prefix: args.mirror_prefix,
        composite_prefix: args.composite_prefix,
        concurrency_limit: args.concurrency,
        max_retries: args.max_retries,
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        scratch_dir: args.scratch_dir,
        provenance: ProvenanceInfo::from_env(),
        skip_existing: !args.force,
        mirror_enabled: !args.composite_only,
        composite_enabled: !args.mirror_only,
        zarr_chunk_size: args.zarr_chunk_size,
        zarr_compression: ZarrCompression::from_str(&args.zarr_compression),
    };

    let summary = run(config).await?;

    info!(
        transferred = summary.transferred,
        assembled = summary.assembled,
        pending = summary.pending,
        failed = summary.failed_timestamps,
        "Pipeline batch finished"
    );

    if summary.failed_timestamps > 0 {
        anyhow::bail!(
            "{} timestamp(s) failed assembly and require a rerun",
            summary.failed_timestamps
        );
    }

    Ok(())
}
