//! Conversion error types.

use netcdf_parser::NetCdfError;
use thiserror::Error;

/// Result type for conversion operations.
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Errors that can occur while converting a dataset to JSON.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// A selected variable lacks `west_east` or `south_north`.
    #[error("Variable {0} is missing the west_east/south_north dimensions")]
    MissingSpatialDimensions(String),

    /// The encoder has no JSON representation for a value kind.
    #[error("Object of type {0} is not JSON serializable")]
    UnsupportedType(String),

    /// Strict encoding met NaN or an infinity.
    #[error("Non-finite value {0} is not allowed in strict JSON output")]
    NonFiniteValue(f64),

    /// Selected variables disagree on the spatial grid extent.
    #[error("Variable {variable} has grid {actual:?}, expected {expected:?}")]
    GridShapeMismatch {
        variable: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// The dataset reader failed.
    #[error("Dataset error: {0}")]
    Dataset(#[from] NetCdfError),

    /// Writing encoded output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ConversionError {
    fn from(e: serde_json::Error) -> Self {
        ConversionError::Io(e.into())
    }
}
