//! Real NetCDF fixture files.
//!
//! Fixtures are written with the `netcdf` crate into temp directories so
//! tests exercise the same libnetcdf read path as uploaded files.

use std::path::{Path, PathBuf};

use crate::generators::{create_test_grid, create_time_series_grid};

/// Shape and contents of a WRF-like fixture file.
#[derive(Debug, Clone, Copy)]
pub struct FixtureShape {
    pub width: usize,
    pub height: usize,
    pub time_steps: usize,
    /// `_FillValue` of `T2`; also written at `T2[0, 0, 0]`.
    pub fill_value: f32,
}

impl FixtureShape {
    pub const fn new(width: usize, height: usize, time_steps: usize) -> Self {
        Self {
            width,
            height,
            time_steps,
            fill_value: -9999.0,
        }
    }

    /// Number of grid cells.
    pub fn cells(&self) -> usize {
        self.width * self.height
    }
}

impl Default for FixtureShape {
    fn default() -> Self {
        SMALL_GRID
    }
}

/// A 4 x 3 grid with two time steps.
pub const SMALL_GRID: FixtureShape = FixtureShape::new(4, 3, 2);

/// A 10 x 10 grid with three time steps.
pub const GRID_10X10: FixtureShape = FixtureShape::new(10, 10, 3);

/// Packing of `PSFC`: stored value `s` unpacks to `s * 0.5 + 1000.0`.
pub const PSFC_SCALE: f64 = 0.5;
pub const PSFC_OFFSET: f64 = 1000.0;

/// Write a WRF-like NetCDF file.
///
/// Variables:
/// - `HGT(south_north, west_east)` f32, values from [`create_test_grid`]
/// - `T2(time, south_north, west_east)` f32 with `_FillValue`, values from
///   [`create_time_series_grid`] except the fill cell at index 0
/// - `LU_INDEX(south_north, west_east)` i32, value `y * width + x`
/// - `PSFC(south_north, west_east)` i16 packed with `scale_factor`/`add_offset`
/// - `XTIME(time)` f64 minutes since start
pub fn write_wrf_fixture(path: &Path, shape: &FixtureShape) -> Result<(), netcdf::Error> {
    let (w, h, steps) = (shape.width, shape.height, shape.time_steps);
    let mut file = netcdf::create(path)?;

    file.add_attribute("TITLE", "OUTPUT FROM SYNTHETIC WRF")?;
    file.add_attribute("DX", 4000.0f32)?;
    file.add_attribute("MAP_PROJ", 1i32)?;

    file.add_dimension("time", steps)?;
    file.add_dimension("south_north", h)?;
    file.add_dimension("west_east", w)?;

    {
        let mut hgt = file.add_variable::<f32>("HGT", &["south_north", "west_east"])?;
        hgt.put_attribute("units", "m")?;
        hgt.put_attribute("description", "Terrain Height")?;
        hgt.put_values(&create_test_grid(w, h), ..)?;
    }

    {
        let mut t2 = file.add_variable::<f32>("T2", &["time", "south_north", "west_east"])?;
        t2.put_attribute("units", "K")?;
        t2.put_attribute("_FillValue", shape.fill_value)?;
        let mut values = create_time_series_grid(w, h, steps);
        if let Some(first) = values.first_mut() {
            *first = shape.fill_value;
        }
        t2.put_values(&values, ..)?;
    }

    {
        let mut lu = file.add_variable::<i32>("LU_INDEX", &["south_north", "west_east"])?;
        let values: Vec<i32> = (0..(w * h) as i32).collect();
        lu.put_values(&values, ..)?;
    }

    {
        let mut psfc = file.add_variable::<i16>("PSFC", &["south_north", "west_east"])?;
        psfc.put_attribute("scale_factor", PSFC_SCALE)?;
        psfc.put_attribute("add_offset", PSFC_OFFSET)?;
        let values: Vec<i16> = (0..(w * h) as i16).collect();
        psfc.put_values(&values, ..)?;
    }

    {
        let mut xtime = file.add_variable::<f64>("XTIME", &["time"])?;
        xtime.put_attribute("units", "minutes since 2024-01-15 00:00:00")?;
        let values: Vec<f64> = (0..steps).map(|t| (t * 60) as f64).collect();
        xtime.put_values(&values, ..)?;
    }

    Ok(())
}

/// Write a fixture into a fresh temp directory.
///
/// The file is removed when the returned `TempDir` is dropped.
pub fn wrf_fixture_file(shape: &FixtureShape) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::Builder::new()
        .prefix("netcdf_json_test_")
        .tempdir()
        .expect("Failed to create temporary test directory");
    let path = dir.path().join("wrfout_fixture.nc");
    write_wrf_fixture(&path, shape).expect("Failed to write NetCDF fixture");
    (dir, path)
}

/// Raw bytes of a fixture file, as a client would upload them.
pub fn wrf_fixture_bytes(shape: &FixtureShape) -> Vec<u8> {
    let (_dir, path) = wrf_fixture_file(shape);
    std::fs::read(&path).expect("Failed to read NetCDF fixture")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_spec_cells() {
        assert_eq!(SMALL_GRID.cells(), 12);
        assert_eq!(GRID_10X10.cells(), 100);
        assert_eq!(FixtureShape::default().time_steps, 2);
    }

    #[test]
    fn test_fixture_file_is_written() {
        let (_dir, path) = wrf_fixture_file(&SMALL_GRID);
        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_fixture_bytes_have_netcdf_magic() {
        let bytes = wrf_fixture_bytes(&SMALL_GRID);
        // classic "CDF" or HDF5-based netCDF-4
        assert!(bytes.starts_with(b"CDF") || bytes.starts_with(b"\x89HDF"));
    }
}
