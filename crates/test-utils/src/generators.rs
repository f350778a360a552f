//! Fixture generators: regional NetCDF grids and zipped month archives.

use std::io::{Cursor, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use aorc_common::time::hour_key;

/// Grid filename carrying the fixed hour suffix, e.g.
/// `AORC_APCP_4KM_ABRFC_1979020100.nc4`.
pub fn grid_filename(alias: &str, timestamp: DateTime<Utc>) -> String {
    format!("AORC_APCP_4KM_{}RFC_{}.nc4", alias, hour_key(timestamp))
}

/// Write a small regional precipitation grid as a NetCDF file.
///
/// Layout matches what the loader expects: 1-D `latitude`/`longitude`
/// coordinates and a row-major `APCP_surface` variable over them.
pub fn write_regional_grid(
    path: &Path,
    lats: &[f64],
    lons: &[f64],
    values: &[f32],
) -> Result<(), netcdf::Error> {
    assert_eq!(values.len(), lats.len() * lons.len(), "grid shape mismatch");

    let mut file = netcdf::create(path)?;
    file.add_dimension("latitude", lats.len())?;
    file.add_dimension("longitude", lons.len())?;

    let mut lat_var = file.add_variable::<f64>("latitude", &["latitude"])?;
    lat_var.put_values(lats, ..)?;

    let mut lon_var = file.add_variable::<f64>("longitude", &["longitude"])?;
    lon_var.put_values(lons, ..)?;

    let mut data_var = file.add_variable::<f32>("APCP_surface", &["latitude", "longitude"])?;
    data_var.put_values(values, ..)?;
    data_var.put_attribute("units", "kg/m^2")?;

    file.add_attribute("source", "AORC")?;

    Ok(())
}

/// Build an in-memory zip archive from (name, bytes) members.
pub fn month_archive(files: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer
            .start_file(name.as_str(), SimpleFileOptions::default())
            .expect("writing to in-memory zip cannot fail");
        writer.write_all(content).expect("writing to in-memory zip cannot fail");
    }
    writer
        .finish()
        .expect("finishing in-memory zip cannot fail")
        .into_inner()
}
