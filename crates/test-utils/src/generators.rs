//! Test data generators for synthetic WRF-like grids.
//!
//! Grids are returned in NetCDF storage order `(south_north, west_east)`,
//! row 0 first. Every generator is deterministic so tests can compute the
//! expected value of any cell.

use netcdf_parser::{Attribute, MemoryDataset, NumericArray, Scalar, FILL_VALUE_ATTR};

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `x * 1000 + y`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[0], 0.0);    // x=0, y=0
/// assert_eq!(grid[1], 1000.0); // x=1, y=0
/// assert_eq!(grid[10], 1.0);   // x=0, y=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 1000 + y) as f32);
        }
    }
    data
}

/// Expected value of [`create_time_series_grid`] at one cell.
pub fn time_series_value(t: usize, x: usize, y: usize) -> f32 {
    (t * 100_000 + x * 1000 + y) as f32
}

/// Creates a `(time, south_north, west_east)` series with values
/// `t * 100000 + x * 1000 + y`.
pub fn create_time_series_grid(width: usize, height: usize, steps: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height * steps);
    for t in 0..steps {
        for y in 0..height {
            for x in 0..width {
                data.push(time_series_value(t, x, y));
            }
        }
    }
    data
}

/// An in-memory dataset shaped like WRF output.
///
/// - dimensions `time`, `south_north`, `west_east`
/// - `HGT(south_north, west_east)` from [`create_test_grid`]
/// - `T2(time, south_north, west_east)` from [`create_time_series_grid`]
/// - `LU_INDEX(south_north, west_east)` as `i32`, value `y * width + x`
/// - global attributes `TITLE` and `DX`
pub fn wrf_like_dataset(width: usize, height: usize, steps: usize) -> MemoryDataset {
    let land_use: Vec<i32> = (0..(width * height) as i32).collect();

    MemoryDataset::new()
        .with_dimension("time", steps)
        .with_dimension("south_north", height)
        .with_dimension("west_east", width)
        .with_attribute("TITLE", "OUTPUT FROM SYNTHETIC WRF")
        .with_attribute("DX", Scalar::F32(4000.0))
        .with_variable_attrs(
            "HGT",
            &["south_north", "west_east"],
            grid(&[height, width], create_test_grid(width, height)),
            vec![Attribute::new("units", "m")],
        )
        .and_then(|ds| {
            ds.with_variable_attrs(
                "T2",
                &["time", "south_north", "west_east"],
                grid(&[steps, height, width], create_time_series_grid(width, height, steps)),
                vec![
                    Attribute::new("units", "K"),
                    Attribute::new(FILL_VALUE_ATTR, Scalar::F32(-9999.0)),
                ],
            )
        })
        .and_then(|ds| {
            ds.with_variable(
                "LU_INDEX",
                &["south_north", "west_east"],
                grid(&[height, width], land_use),
            )
        })
        .expect("synthetic dataset shapes are consistent")
}

fn grid<T: netcdf_parser::NumericElement>(shape: &[usize], values: Vec<T>) -> NumericArray {
    NumericArray::from_shape_vec(shape, values).expect("synthetic grid shape")
}

#[cfg(test)]
mod tests {
    use super::*;
    use netcdf_parser::DatasetReader;

    #[test]
    fn test_create_test_grid() {
        let grid = create_test_grid(10, 5);
        assert_eq!(grid.len(), 50);
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[1], 1000.0);
        assert_eq!(grid[10], 1.0);
        assert_eq!(grid[11], 1001.0);
    }

    #[test]
    fn test_create_time_series_grid() {
        let grid = create_time_series_grid(4, 3, 2);
        assert_eq!(grid.len(), 24);
        // t=1, y=2, x=3
        assert_eq!(grid[12 + 2 * 4 + 3], time_series_value(1, 3, 2));
    }

    #[test]
    fn test_wrf_like_dataset() {
        let dataset = wrf_like_dataset(4, 3, 2);
        assert_eq!(
            dataset.variable_names().unwrap(),
            vec!["HGT".to_string(), "T2".to_string(), "LU_INDEX".to_string()]
        );

        let t2 = dataset.read_variable("T2").unwrap().unwrap();
        assert_eq!(t2.fill_value, Some(Scalar::F32(-9999.0)));
        assert_eq!(t2.data.as_array().unwrap().shape(), &[2, 3, 4]);
    }
}
