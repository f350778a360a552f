//! No-conflicts merge of regional grids onto a shared national lattice.
//!
//! Regions publish on a common 4 km lattice, so the composite grid is the
//! union of every region's coordinates. Overlapping cells must agree:
//! a genuine value disagreement is a hard error, never resolved silently.
//! Attributes that diverge between regions are dropped from the result.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{CompositeError, CompositeResult};
use crate::grid::RegionalGrid;

/// Overlapping cells agreeing within this absolute tolerance are one value.
const CELL_TOLERANCE: f32 = 1e-6;

/// Coordinate reference attached to every composite.
pub const COMPOSITE_CRS: &str = "EPSG:4326";

/// The merged national grid for one hour.
#[derive(Debug, Clone)]
pub struct CompositeGrid {
    pub variable: String,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    /// Row-major `[lat][lon]`; NaN outside every region's extent.
    pub values: Vec<f32>,
    pub attrs: BTreeMap<String, String>,
}

fn sorted_union(axes: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = axes.collect();
    values.sort_by(|a, b| a.partial_cmp(b).expect("coordinates are never NaN"));
    values.dedup();
    values
}

fn axis_index(axis: &[f64], value: f64) -> usize {
    axis.binary_search_by(|probe| probe.partial_cmp(&value).expect("coordinates are never NaN"))
        .expect("axis is the union of every grid's coordinates")
}

/// Merge attribute maps, dropping any key whose values diverge.
fn merge_attrs(grids: &[RegionalGrid]) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = BTreeMap::new();
    let mut dropped: BTreeSet<String> = BTreeSet::new();

    for grid in grids {
        for (key, value) in &grid.attrs {
            if dropped.contains(key) {
                continue;
            }
            match merged.get(key) {
                None => {
                    merged.insert(key.clone(), value.clone());
                }
                Some(existing) if existing == value => {}
                Some(_) => {
                    debug!(attribute = %key, "dropping attribute with divergent values");
                    merged.remove(key);
                    dropped.insert(key.clone());
                }
            }
        }
    }

    merged
}

/// Merge regional grids into one composite along their shared coordinates.
pub fn merge_grids(grids: &[RegionalGrid]) -> CompositeResult<CompositeGrid> {
    let first = grids.first().ok_or(CompositeError::Format {
        path: String::new(),
        message: "no grids to merge".to_string(),
    })?;

    for grid in grids {
        if grid.variable != first.variable {
            return Err(CompositeError::Format {
                path: String::new(),
                message: format!(
                    "variable mismatch: {} vs {}",
                    first.variable, grid.variable
                ),
            });
        }
    }

    let lats = sorted_union(grids.iter().flat_map(|g| g.lats.iter().copied()));
    let lons = sorted_union(grids.iter().flat_map(|g| g.lons.iter().copied()));

    let mut values = vec![f32::NAN; lats.len() * lons.len()];
    for grid in grids {
        for (i, &lat) in grid.lats.iter().enumerate() {
            let row = axis_index(&lats, lat);
            for (j, &lon) in grid.lons.iter().enumerate() {
                let incoming = grid.value(i, j);
                if incoming.is_nan() {
                    continue;
                }
                let col = axis_index(&lons, lon);
                let cell = &mut values[row * lons.len() + col];
                if cell.is_nan() {
                    *cell = incoming;
                } else if (*cell - incoming).abs() > CELL_TOLERANCE {
                    return Err(CompositeError::MergeConflict {
                        lat,
                        lon,
                        existing: *cell,
                        incoming,
                        region: grid.region_alias.clone(),
                    });
                }
            }
        }
    }

    let mut attrs = merge_attrs(grids);
    attrs.insert("crs".to_string(), COMPOSITE_CRS.to_string());

    Ok(CompositeGrid {
        variable: first.variable.clone(),
        lats,
        lons,
        values,
        attrs,
    })
}
