//! Read-only access to NetCDF datasets.
//!
//! This crate exposes the structure of a NetCDF file (named dimensions,
//! variables with their dimension names and attributes, global attributes)
//! and reads variable data into dense `ndarray` arrays that keep the file's
//! element type.
//!
//! # Implementation Notes
//!
//! Two readers implement [`DatasetReader`]:
//!
//! - [`NetCdfDataset`] wraps the `netcdf` crate (libnetcdf/HDF5). It can be
//!   opened from a path or from uploaded bytes, in which case it owns a temp
//!   file that lives exactly as long as the handle.
//! - [`MemoryDataset`] holds everything in memory and is used for synthetic
//!   data and tests.
//!
//! Missing cells are not masked: data comes back with the fill value in
//! place, and the fill value itself is carried next to the data.

pub mod dataset;
pub mod error;
pub mod native;
pub mod value;

pub use dataset::{
    Attribute, DatasetReader, Dimension, MemoryDataset, Variable, VariableInfo, FILL_VALUE_ATTR,
};
pub use error::{NetCdfError, NetCdfResult};
pub use native::{default_temp_dir, silence_hdf5_errors, unpack_cf, NetCdfDataset, ReadOptions};
pub use value::{NcValue, NumericArray, NumericElement, Scalar};
