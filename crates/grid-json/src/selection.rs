//! Variable selection and axis normalization.
//!
//! Every selected variable is brought into the canonical layout
//! `(west_east, south_north, ...rest)`, subset along the two spatial axes
//! and downsampled by a stride before it reaches the grid stream.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;

use netcdf_parser::{DatasetReader, NcValue, NumericArray, Scalar};
use tracing::debug;

use crate::error::{ConversionError, ConversionResult};

/// Name of the x (longitude-like) grid axis.
pub const WEST_EAST: &str = "west_east";
/// Name of the y (latitude-like) grid axis.
pub const SOUTH_NORTH: &str = "south_north";
/// Name of the time axis.
pub const TIME: &str = "time";

/// A half-open index range `[start, end)` along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub start: usize,
    pub end: usize,
}

impl IndexRange {
    /// The whole axis.
    pub const FULL: IndexRange = IndexRange {
        start: 0,
        end: usize::MAX,
    };

    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// What to extract from a dataset for the grid stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Requested variable names, in output order.
    pub variables: Vec<String>,
    /// Range along `west_east`; `None` keeps the whole axis.
    pub x_range: Option<IndexRange>,
    /// Range along `south_north`; `None` keeps the whole axis.
    pub y_range: Option<IndexRange>,
    /// Keep every `stride`-th index along both spatial axes.
    pub stride: NonZeroUsize,
}

impl Selection {
    pub fn new<I, S>(variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variables: variables.into_iter().map(Into::into).collect(),
            x_range: None,
            y_range: None,
            stride: NonZeroUsize::MIN,
        }
    }

    pub fn with_x_range(mut self, range: IndexRange) -> Self {
        self.x_range = Some(range);
        self
    }

    pub fn with_y_range(mut self, range: IndexRange) -> Self {
        self.y_range = Some(range);
        self
    }

    pub fn with_stride(mut self, stride: NonZeroUsize) -> Self {
        self.stride = stride;
        self
    }
}

/// A variable in canonical axis order, subset and strided.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedVariable {
    pub name: String,
    /// Dimension names in canonical order; always starts with
    /// `west_east`, `south_north`.
    pub dimension_names: Vec<String>,
    pub data: NumericArray,
    pub fill_value: Option<Scalar>,
}

impl ProcessedVariable {
    /// `(width, height)` of the spatial grid after subsetting.
    pub fn grid_shape(&self) -> (usize, usize) {
        (self.data.len_of(0), self.data.len_of(1))
    }

    /// Position of the `time` axis in the canonical layout.
    pub fn time_axis(&self) -> Option<usize> {
        self.dimension_names.iter().position(|d| d == TIME)
    }

    /// Number of time steps, zero for a variable without a time axis.
    pub fn time_len(&self) -> usize {
        self.time_axis().map_or(0, |axis| self.data.len_of(axis))
    }

    pub fn is_temporal(&self) -> bool {
        self.time_axis().is_some()
    }

    /// Value at grid cell `(x, y)`. Extra axes come back as an array.
    pub fn value_at(&self, x: usize, y: usize) -> Option<NcValue> {
        self.data.pick(&[(0, x), (1, y)])
    }

    /// Value at grid cell `(x, y)` and time step `t`; `None` past the end
    /// of this variable's time axis.
    pub fn value_at_time(&self, x: usize, y: usize, t: usize) -> Option<NcValue> {
        let axis = self.time_axis()?;
        self.data.pick(&[(0, x), (1, y), (axis, t)])
    }
}

/// Output of [`select_variables`], split by whether a variable varies in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectedVariables {
    pub spatial: Vec<ProcessedVariable>,
    pub temporal: Vec<ProcessedVariable>,
}

impl SelectedVariables {
    pub fn is_empty(&self) -> bool {
        self.spatial.is_empty() && self.temporal.is_empty()
    }

    pub fn len(&self) -> usize {
        self.spatial.len() + self.temporal.len()
    }

    /// Grid extent, taken from the first spatial-only variable if there is
    /// one, else from the first time-indexed variable.
    pub fn grid_shape(&self) -> Option<(usize, usize)> {
        self.spatial
            .first()
            .or_else(|| self.temporal.first())
            .map(ProcessedVariable::grid_shape)
    }

    /// Longest time axis among the time-indexed variables.
    pub fn max_time_len(&self) -> usize {
        self.temporal
            .iter()
            .map(ProcessedVariable::time_len)
            .max()
            .unwrap_or(0)
    }

    /// Every variable, spatial-only first.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessedVariable> {
        self.spatial.iter().chain(self.temporal.iter())
    }
}

/// Map each dimension name to its position in `dimensions`.
///
/// Positions are the original storage positions; nothing is reordered.
pub fn dimension_positions(dimensions: &[String]) -> HashMap<String, usize> {
    dimensions
        .iter()
        .enumerate()
        .map(|(position, name)| (name.clone(), position))
        .collect()
}

/// Axis permutation that moves `west_east` to axis 0 and `south_north` to
/// axis 1, keeping every other axis in its original relative order.
pub fn canonical_permutation(variable: &str, dimensions: &[String]) -> ConversionResult<Vec<usize>> {
    let positions = dimension_positions(dimensions);
    let (x_axis, y_axis) = match (positions.get(WEST_EAST), positions.get(SOUTH_NORTH)) {
        (Some(&x), Some(&y)) => (x, y),
        _ => return Err(ConversionError::MissingSpatialDimensions(variable.to_string())),
    };

    let mut permutation = Vec::with_capacity(dimensions.len());
    permutation.push(x_axis);
    permutation.push(y_axis);
    permutation.extend((0..dimensions.len()).filter(|&axis| axis != x_axis && axis != y_axis));
    Ok(permutation)
}

/// Read, normalize and classify the requested variables.
///
/// Names the dataset does not contain are skipped, and a repeated name is
/// only taken once. A selected variable without both spatial axes aborts
/// the whole selection.
pub fn select_variables<D>(dataset: &D, selection: &Selection) -> ConversionResult<SelectedVariables>
where
    D: DatasetReader + ?Sized,
{
    let mut selected = SelectedVariables::default();
    let mut seen = HashSet::new();

    for name in &selection.variables {
        if !seen.insert(name.as_str()) {
            continue;
        }
        let Some(info) = dataset.variable_info(name)? else {
            debug!(variable = %name, "Requested variable not in dataset, skipping");
            continue;
        };

        // Checked before any data is read.
        let permutation = canonical_permutation(name, &info.dimension_names)?;

        let Some(variable) = dataset.read_variable(name)? else {
            continue;
        };
        let data = match variable.data {
            NcValue::Array(array) => array,
            other => return Err(ConversionError::UnsupportedType(other.type_name().to_string())),
        };

        let processed = normalize(
            name,
            &variable.info.dimension_names,
            data,
            variable.fill_value,
            &permutation,
            selection,
        );
        debug!(
            variable = %name,
            shape = ?processed.data.shape(),
            temporal = processed.is_temporal(),
            "Normalized variable"
        );

        if processed.is_temporal() {
            selected.temporal.push(processed);
        } else {
            selected.spatial.push(processed);
        }
    }

    Ok(selected)
}

fn normalize(
    name: &str,
    dimension_names: &[String],
    data: NumericArray,
    fill_value: Option<Scalar>,
    permutation: &[usize],
    selection: &Selection,
) -> ProcessedVariable {
    let stride = selection.stride.get();
    let x = selection.x_range.unwrap_or(IndexRange::FULL);
    let y = selection.y_range.unwrap_or(IndexRange::FULL);

    let data = data
        .permuted_axes(permutation)
        .slice_axis(0, x.start, x.end, stride)
        .slice_axis(1, y.start, y.end, stride);

    ProcessedVariable {
        name: name.to_string(),
        dimension_names: permutation
            .iter()
            .map(|&axis| dimension_names[axis].clone())
            .collect(),
        data,
        fill_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netcdf_parser::MemoryDataset;

    fn names(dims: &[&str]) -> Vec<String> {
        dims.iter().map(|d| d.to_string()).collect()
    }

    fn stride(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    /// 10x10 grid stored as (west_east, south_north); value = x * 10 + y.
    fn spatial_dataset() -> MemoryDataset {
        let values: Vec<f32> = (0..100).map(|v| v as f32).collect();
        MemoryDataset::new()
            .with_dimension(WEST_EAST, 10)
            .with_dimension(SOUTH_NORTH, 10)
            .with_variable(
                "HGT",
                &[WEST_EAST, SOUTH_NORTH],
                NumericArray::from_shape_vec(&[10, 10], values).unwrap(),
            )
            .unwrap()
    }

    /// 3x10x10 stored as (time, south_north, west_east); value = t*100 + y*10 + x.
    fn temporal_dataset() -> MemoryDataset {
        let values: Vec<i32> = (0..300).collect();
        MemoryDataset::new()
            .with_dimension(TIME, 3)
            .with_dimension(SOUTH_NORTH, 10)
            .with_dimension(WEST_EAST, 10)
            .with_variable(
                "T2",
                &[TIME, SOUTH_NORTH, WEST_EAST],
                NumericArray::from_shape_vec(&[3, 10, 10], values).unwrap(),
            )
            .unwrap()
    }

    #[test]
    fn test_dimension_positions_canonical_order() {
        let positions = dimension_positions(&names(&["west_east", "south_north", "up_down", "time"]));
        assert_eq!(positions.len(), 4);
        assert_eq!(positions["west_east"], 0);
        assert_eq!(positions["south_north"], 1);
        assert_eq!(positions["up_down"], 2);
        assert_eq!(positions["time"], 3);
    }

    #[test]
    fn test_dimension_positions_keeps_original_positions() {
        let positions = dimension_positions(&names(&["time", "west_east", "south_north"]));
        assert_eq!(positions.len(), 3);
        assert_eq!(positions["west_east"], 1);
        assert_eq!(positions["south_north"], 2);
        assert_eq!(positions["time"], 0);
    }

    #[test]
    fn test_canonical_permutation() {
        let dims = names(&["time", "bottom_top", "south_north", "west_east"]);
        assert_eq!(canonical_permutation("T", &dims).unwrap(), vec![3, 2, 0, 1]);
    }

    #[test]
    fn test_spatial_subset_and_stride() {
        let selection = Selection::new(["HGT"])
            .with_x_range(IndexRange::new(2, 8))
            .with_y_range(IndexRange::new(2, 8))
            .with_stride(stride(2));

        let selected = select_variables(&spatial_dataset(), &selection).unwrap();
        assert!(selected.temporal.is_empty());
        assert_eq!(selected.spatial.len(), 1);

        let hgt = &selected.spatial[0];
        assert_eq!(hgt.grid_shape(), (3, 3));
        // [2:8, 2:8][::2, ::2] keeps indices 2, 4, 6 on both axes.
        for (i, x) in [2usize, 4, 6].into_iter().enumerate() {
            for (j, y) in [2usize, 4, 6].into_iter().enumerate() {
                assert_eq!(hgt.data.get(&[i, j]), Some(Scalar::F32((x * 10 + y) as f32)));
            }
        }
    }

    #[test]
    fn test_temporal_variable_is_reordered_and_strided() {
        let selection = Selection::new(["T2"])
            .with_x_range(IndexRange::new(2, 8))
            .with_y_range(IndexRange::new(2, 8))
            .with_stride(stride(2));

        let selected = select_variables(&temporal_dataset(), &selection).unwrap();
        assert!(selected.spatial.is_empty());

        let t2 = &selected.temporal[0];
        assert_eq!(t2.dimension_names, names(&[WEST_EAST, SOUTH_NORTH, TIME]));
        assert_eq!(t2.data.shape(), &[3, 3, 3]);
        assert_eq!(t2.time_axis(), Some(2));
        assert_eq!(t2.time_len(), 3);
        // x index 1 -> west_east 4, y index 2 -> south_north 6, t = 1
        assert_eq!(t2.data.get(&[1, 2, 1]), Some(Scalar::I32(164)));
        assert_eq!(
            t2.value_at_time(1, 2, 1),
            Some(NcValue::Scalar(Scalar::I32(164)))
        );
        assert_eq!(t2.value_at_time(1, 2, 3), None);
    }

    #[test]
    fn test_missing_spatial_dimensions() {
        let dataset = spatial_dataset()
            .with_dimension(TIME, 2)
            .with_variable(
                "Times",
                &[TIME],
                NumericArray::from_shape_vec(&[2], vec![0i32, 1]).unwrap(),
            )
            .unwrap();

        let result = select_variables(&dataset, &Selection::new(["HGT", "Times"]));
        assert!(
            matches!(result, Err(ConversionError::MissingSpatialDimensions(ref v)) if v == "Times")
        );
    }

    #[test]
    fn test_unknown_variables_are_skipped() {
        let selected =
            select_variables(&spatial_dataset(), &Selection::new(["nope", "HGT"])).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected.spatial[0].name, "HGT");
    }

    #[test]
    fn test_repeated_names_selected_once() {
        let dataset = temporal_dataset()
            .with_variable(
                "HGT",
                &[SOUTH_NORTH, WEST_EAST],
                NumericArray::from_shape_vec(&[10, 10], vec![1.0f32; 100]).unwrap(),
            )
            .unwrap();
        let selection = Selection::new(["HGT", "T2", "HGT", "T2"]);

        let selected = select_variables(&dataset, &selection).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected.spatial[0].name, "HGT");
        assert_eq!(selected.temporal[0].name, "T2");
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let selection = Selection::new(["HGT"])
            .with_x_range(IndexRange::new(7, 50))
            .with_y_range(IndexRange::new(20, 30));

        let selected = select_variables(&spatial_dataset(), &selection).unwrap();
        assert_eq!(selected.grid_shape(), Some((3, 0)));
    }

    #[test]
    fn test_unsupported_data_type() {
        let dataset = MemoryDataset::new()
            .with_dimension(WEST_EAST, 2)
            .with_dimension(SOUTH_NORTH, 2)
            .with_unsupported_variable("blob", &[WEST_EAST, SOUTH_NORTH], "compound");

        let result = select_variables(&dataset, &Selection::new(["blob"]));
        assert!(matches!(result, Err(ConversionError::UnsupportedType(ref t)) if t == "compound"));
    }

    #[test]
    fn test_fill_value_is_carried() {
        use netcdf_parser::{Attribute, FILL_VALUE_ATTR};

        let dataset = MemoryDataset::new()
            .with_dimension(WEST_EAST, 1)
            .with_dimension(SOUTH_NORTH, 1)
            .with_variable_attrs(
                "Q2",
                &[WEST_EAST, SOUTH_NORTH],
                NumericArray::from_shape_vec(&[1, 1], vec![-9999.0f32]).unwrap(),
                vec![Attribute::new(FILL_VALUE_ATTR, Scalar::F32(-9999.0))],
            )
            .unwrap();

        let selected = select_variables(&dataset, &Selection::new(["Q2"])).unwrap();
        assert_eq!(selected.spatial[0].fill_value, Some(Scalar::F32(-9999.0)));
    }
}
