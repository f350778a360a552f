//! Zarr V3 writer for composite grids.
//!
//! A composite is written as a group with three arrays: the precipitation
//! variable (2-D, chunked, optionally blosc-compressed) and its latitude and
//! longitude coordinates. The store is always rebuilt from scratch so reruns
//! reproduce identical output.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs_filesystem::FilesystemStore;

use crate::error::{CompositeError, CompositeResult};
use crate::merge::CompositeGrid;

/// Compression codec for composite stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZarrCompression {
    /// No compression.
    None,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd (recommended).
    BloscZstd,
}

impl ZarrCompression {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZarrCompression::None => "none",
            ZarrCompression::BloscLz4 => "blosc-lz4",
            ZarrCompression::BloscZstd => "blosc-zstd",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => ZarrCompression::None,
            "blosc-lz4" | "lz4" => ZarrCompression::BloscLz4,
            _ => ZarrCompression::BloscZstd,
        }
    }
}

/// Configuration for composite store layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeWriterConfig {
    /// Chunk dimension for the data array (square chunks).
    pub chunk_size: usize,
    pub compression: ZarrCompression,
    /// Compression level (1-9).
    pub compression_level: u8,
}

impl Default for CompositeWriterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            compression: ZarrCompression::BloscZstd,
            compression_level: 1,
        }
    }
}

fn zarr_err(e: impl std::fmt::Display) -> CompositeError {
    CompositeError::ZarrWrite(e.to_string())
}

fn compression_codec(
    config: &CompositeWriterConfig,
) -> CompositeResult<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
    let level = BloscCompressionLevel::try_from(config.compression_level)
        .map_err(|_| CompositeError::ZarrWrite("invalid compression level".to_string()))?;

    let compressor = match config.compression {
        ZarrCompression::None => {
            return Err(CompositeError::ZarrWrite(
                "no compression configured".to_string(),
            ))
        }
        ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
        ZarrCompression::BloscZstd => BloscCompressor::Zstd,
    };

    // typesize is required when shuffle is enabled
    let codec = BloscCodec::new(
        compressor,
        level,
        None,
        BloscShuffleMode::Shuffle,
        Some(4), // f32 = 4 bytes
    )
    .map_err(zarr_err)?;

    Ok(Arc::new(codec))
}

fn write_coordinate(
    store: Arc<FilesystemStore>,
    path: &str,
    values: &[f64],
) -> CompositeResult<()> {
    let len = values.len().max(1) as u64;
    let chunk_grid: zarrs::array::ChunkGrid = vec![len].try_into().map_err(zarr_err)?;

    let array = ArrayBuilder::new(
        vec![values.len() as u64],
        DataType::Float64,
        chunk_grid,
        FillValue::from(f64::NAN),
    )
    .build(store, path)
    .map_err(zarr_err)?;

    array.store_metadata().map_err(zarr_err)?;

    let subset =
        ArraySubset::new_with_start_shape(vec![0], vec![values.len() as u64]).map_err(zarr_err)?;
    array
        .store_array_subset_elements(&subset, values)
        .map_err(zarr_err)?;

    Ok(())
}

/// Write a composite grid as a Zarr V3 store at `path`.
///
/// An existing store at that path is removed first: assembly is idempotent
/// per timestamp, so a rerun deterministically overwrites. Returns the
/// approximate number of data bytes written.
pub fn write_composite_store(
    path: &Path,
    grid: &CompositeGrid,
    attributes: serde_json::Map<String, serde_json::Value>,
    config: &CompositeWriterConfig,
) -> CompositeResult<u64> {
    if path.exists() {
        std::fs::remove_dir_all(path)?;
    }
    std::fs::create_dir_all(path)?;

    let store = Arc::new(FilesystemStore::new(path).map_err(zarr_err)?);

    // Group metadata carries the composite record and merged grid attributes.
    let mut group_attrs = attributes;
    for (key, value) in &grid.attrs {
        group_attrs
            .entry(key.clone())
            .or_insert_with(|| serde_json::json!(value));
    }

    let mut binding = GroupBuilder::new();
    let group_builder = binding.attributes(group_attrs);
    let group = group_builder.build(store.clone(), "/").map_err(zarr_err)?;
    group.store_metadata().map_err(zarr_err)?;

    write_coordinate(store.clone(), "/latitude", &grid.lats)?;
    write_coordinate(store.clone(), "/longitude", &grid.lons)?;

    let height = grid.lats.len();
    let width = grid.lons.len();
    let chunk_size = config.chunk_size.max(1) as u64;

    let chunk_grid: zarrs::array::ChunkGrid =
        vec![chunk_size, chunk_size].try_into().map_err(zarr_err)?;

    let mut data_attrs = serde_json::Map::new();
    data_attrs.insert(
        "dimensions".to_string(),
        serde_json::json!(["latitude", "longitude"]),
    );
    data_attrs.insert(
        "compression".to_string(),
        serde_json::json!(config.compression.as_str()),
    );

    let mut binding = ArrayBuilder::new(
        vec![height as u64, width as u64], // shape [rows, cols]
        DataType::Float32,
        chunk_grid,
        FillValue::from(f32::NAN),
    );
    let mut builder = binding.attributes(data_attrs);

    if config.compression != ZarrCompression::None {
        let codec = compression_codec(config)?;
        builder = builder.bytes_to_bytes_codecs(vec![codec]);
    }

    let array = builder
        .build(store, &format!("/{}", grid.variable))
        .map_err(zarr_err)?;

    array.store_metadata().map_err(zarr_err)?;

    let subset = ArraySubset::new_with_start_shape(vec![0, 0], vec![height as u64, width as u64])
        .map_err(zarr_err)?;
    array
        .store_array_subset_elements(&subset, &grid.values)
        .map_err(zarr_err)?;

    let bytes_written = (grid.values.len() * std::mem::size_of::<f32>()
        + (grid.lats.len() + grid.lons.len()) * std::mem::size_of::<f64>())
        as u64;
    Ok(bytes_written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_grid() -> CompositeGrid {
        CompositeGrid {
            variable: "APCP_surface".to_string(),
            lats: vec![40.0, 41.0],
            lons: vec![-100.0, -99.0, -98.0],
            values: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            attrs: BTreeMap::from([("crs".to_string(), "EPSG:4326".to_string())]),
        }
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("1979020100.zarr");
        let grid = sample_grid();

        let written =
            write_composite_store(&store_path, &grid, serde_json::Map::new(), &Default::default())
                .unwrap();
        assert!(written > 0);

        let store = Arc::new(FilesystemStore::new(&store_path).unwrap());
        let array = zarrs::array::Array::open(store, "/APCP_surface").unwrap();
        let subset = ArraySubset::new_with_start_shape(vec![0, 0], vec![2, 3]).unwrap();
        let read_back: Vec<f32> = array.retrieve_array_subset_elements(&subset).unwrap();
        assert_eq!(read_back, grid.values);
    }

    #[test]
    fn test_rerun_overwrites_identically() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("1979020100.zarr");
        let grid = sample_grid();

        write_composite_store(&store_path, &grid, serde_json::Map::new(), &Default::default())
            .unwrap();
        // Second write must not error and must reproduce the same values.
        write_composite_store(&store_path, &grid, serde_json::Map::new(), &Default::default())
            .unwrap();

        let store = Arc::new(FilesystemStore::new(&store_path).unwrap());
        let array = zarrs::array::Array::open(store, "/APCP_surface").unwrap();
        let subset = ArraySubset::new_with_start_shape(vec![0, 0], vec![2, 3]).unwrap();
        let read_back: Vec<f32> = array.retrieve_array_subset_elements(&subset).unwrap();
        assert_eq!(read_back, grid.values);
    }

    #[test]
    fn test_uncompressed_write() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("plain.zarr");
        let config = CompositeWriterConfig {
            compression: ZarrCompression::None,
            ..Default::default()
        };

        write_composite_store(&store_path, &sample_grid(), serde_json::Map::new(), &config)
            .unwrap();
        assert!(store_path.join("zarr.json").exists());
    }
}
