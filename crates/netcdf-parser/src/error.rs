//! Error types for NetCDF reading operations.

use thiserror::Error;

/// Result type for NetCDF parser operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF reading.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing required variable, dimension or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// The file could not be opened or a value could not be decoded
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Array data does not match the declared dimensions
    #[error("Shape mismatch for {variable}: expected {expected:?}, got {actual} values")]
    ShapeMismatch {
        variable: String,
        expected: Vec<usize>,
        actual: usize,
    },
}

impl From<netcdf::Error> for NetCdfError {
    fn from(e: netcdf::Error) -> Self {
        NetCdfError::InvalidFormat(e.to_string())
    }
}
