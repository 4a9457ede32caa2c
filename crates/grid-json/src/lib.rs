//! NetCDF to JSON conversion.
//!
//! Three outputs are produced from a [`DatasetReader`]:
//!
//! - a metadata document (dimensions, variable structure, attributes),
//! - a data document (every variable's data in storage order),
//! - a stream of per-cell grid records for a selection of variables.
//!
//! The grid path normalizes every selected variable to
//! `(west_east, south_north, ...)`, subsets and strides the two spatial
//! axes, and then walks the grid one cell at a time:
//!
//! ```ignore
//! use grid_json::{grid_records, Selection};
//!
//! let selection = Selection::new(["T2", "HGT"]);
//! for record in grid_records(&dataset, &selection)? {
//!     sink.write_all(record?.as_bytes())?;
//! }
//! ```

pub mod document;
pub mod encoder;
pub mod error;
pub mod selection;
pub mod stream;

pub use document::{data_document, metadata_document, write_data_document, write_metadata_document};
pub use encoder::{Encoder, EncodingMode};
pub use error::{ConversionError, ConversionResult};
pub use selection::{
    canonical_permutation, dimension_positions, select_variables, IndexRange, ProcessedVariable,
    SelectedVariables, Selection, SOUTH_NORTH, TIME, WEST_EAST,
};
pub use stream::{split_records, GridRecordStream, RECORD_DELIMITER};

use netcdf_parser::DatasetReader;

/// Select and normalize variables, then stream their grid records.
///
/// Selection errors surface here, before the first record.
pub fn grid_records<D>(dataset: &D, selection: &Selection) -> ConversionResult<GridRecordStream>
where
    D: DatasetReader + ?Sized,
{
    let selected = select_variables(dataset, selection)?;
    GridRecordStream::new(selected)
}
