//! Reading regional grid files into labelled in-memory arrays.
//!
//! Grid files are NetCDF: a precipitation variable over 1-D latitude and
//! longitude coordinates, with an optional length-one time dimension. Fill
//! values become NaN and scale/offset attributes are applied on read, so the
//! merge stage only ever sees physical values.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CompositeError, CompositeResult};

/// Variable name carried by AORC precipitation files.
pub const PRECIP_VARIABLE: &str = "APCP_surface";

const LATITUDE_NAMES: [&str; 2] = ["latitude", "lat"];
const LONGITUDE_NAMES: [&str; 2] = ["longitude", "lon"];

/// One region's hourly grid: 1-D coordinates and row-major values.
#[derive(Debug, Clone)]
pub struct RegionalGrid {
    pub region_alias: String,
    pub variable: String,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    /// Row-major `[lat][lon]`, NaN where the source had fill values.
    pub values: Vec<f32>,
    /// Global attributes, stringified.
    pub attrs: BTreeMap<String, String>,
}

impl RegionalGrid {
    pub fn value(&self, lat_index: usize, lon_index: usize) -> f32 {
        self.values[lat_index * self.lons.len() + lon_index]
    }
}

fn format_error(path: &Path, message: impl Into<String>) -> CompositeError {
    CompositeError::Format {
        path: path.display().to_string(),
        message: message.into(),
    }
}

fn attr_string(value: &netcdf::AttributeValue) -> String {
    use netcdf::AttributeValue::*;
    match value {
        Str(s) => s.clone(),
        Strs(s) => s.join(","),
        Uchar(v) => v.to_string(),
        Schar(v) => v.to_string(),
        Ushort(v) => v.to_string(),
        Short(v) => v.to_string(),
        Uint(v) => v.to_string(),
        Int(v) => v.to_string(),
        Ulonglong(v) => v.to_string(),
        Longlong(v) => v.to_string(),
        Float(v) => v.to_string(),
        Double(v) => v.to_string(),
        other => format!("{:?}", other),
    }
}

fn attr_f32(var: &netcdf::Variable<'_>, name: &str) -> Option<f32> {
    use netcdf::AttributeValue::*;
    match var.attribute(name)?.value().ok()? {
        Float(v) => Some(v),
        Double(v) => Some(v as f32),
        Short(v) => Some(v as f32),
        Int(v) => Some(v as f32),
        _ => None,
    }
}

fn read_coordinate(
    file: &netcdf::File,
    names: &[&str],
    path: &Path,
) -> CompositeResult<(String, Vec<f64>)> {
    for name in names {
        if let Some(var) = file.variable(name) {
            let values: Vec<f64> = var
                .get_values(..)
                .map_err(|e| format_error(path, format!("failed to read {}: {}", name, e)))?;
            if values.iter().any(|v| v.is_nan()) {
                return Err(format_error(path, format!("{} contains NaN", name)));
            }
            return Ok((name.to_string(), values));
        }
    }
    Err(format_error(
        path,
        format!("no coordinate variable among {:?}", names),
    ))
}

/// Open a grid file and read it into a [`RegionalGrid`].
pub fn load_regional_grid(path: &Path, region_alias: &str) -> CompositeResult<RegionalGrid> {
    let file =
        netcdf::open(path).map_err(|e| format_error(path, format!("failed to open: {}", e)))?;

    let (lat_name, lats) = read_coordinate(&file, &LATITUDE_NAMES, path)?;
    let (lon_name, lons) = read_coordinate(&file, &LONGITUDE_NAMES, path)?;

    // Prefer the known precipitation variable, otherwise the first variable
    // spanning both spatial dimensions.
    let var = file
        .variable(PRECIP_VARIABLE)
        .or_else(|| {
            file.variables().find(|v| {
                let dims: Vec<_> = v.dimensions().iter().map(|d| d.name()).collect();
                dims.contains(&lat_name) && dims.contains(&lon_name)
            })
        })
        .ok_or_else(|| format_error(path, "no grid variable spanning both coordinates"))?;

    // Tolerate a leading time dimension of length one; per-hour files must
    // not carry more than a single record.
    let spatial_len = lats.len() * lons.len();
    let total_len: usize = var.dimensions().iter().map(|d| d.len()).product();
    if total_len != spatial_len {
        return Err(format_error(
            path,
            format!(
                "expected {} x {} grid, variable {} has {} elements",
                lats.len(),
                lons.len(),
                var.name(),
                total_len
            ),
        ));
    }

    let raw: Vec<f32> = var
        .get_values(..)
        .map_err(|e| format_error(path, format!("failed to read {}: {}", var.name(), e)))?;

    let fill_value = attr_f32(&var, "_FillValue");
    let scale_factor = attr_f32(&var, "scale_factor").unwrap_or(1.0);
    let add_offset = attr_f32(&var, "add_offset").unwrap_or(0.0);

    let values: Vec<f32> = raw
        .iter()
        .map(|&v| {
            if fill_value.is_some_and(|fill| v == fill) {
                f32::NAN
            } else {
                v * scale_factor + add_offset
            }
        })
        .collect();

    let mut attrs = BTreeMap::new();
    for attribute in file.attributes() {
        if let Ok(value) = attribute.value() {
            attrs.insert(attribute.name().to_string(), attr_string(&value));
        }
    }

    Ok(RegionalGrid {
        region_alias: region_alias.to_string(),
        variable: var.name().to_string(),
        lats,
        lons,
        values,
        attrs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_indexing() {
        let grid = RegionalGrid {
            region_alias: "AB".to_string(),
            variable: PRECIP_VARIABLE.to_string(),
            lats: vec![30.0, 31.0],
            lons: vec![-100.0, -99.0, -98.0],
            values: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            attrs: BTreeMap::new(),
        };
        assert_eq!(grid.value(0, 2), 2.0);
        assert_eq!(grid.value(1, 0), 3.0);
    }

    #[test]
    fn test_missing_file_is_format_error() {
        let result = load_regional_grid(Path::new("/nonexistent/grid.nc4"), "AB");
        assert!(matches!(result, Err(CompositeError::Format { .. })));
    }
}
