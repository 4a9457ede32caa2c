//! HTTP error mapping.
//!
//! Request-shape problems are reported back as 400 with a message. Every
//! conversion failure is reported as the same generic 500; the detail only
//! goes to the log.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use grid_json::ConversionError;
use netcdf_parser::NetCdfError;
use serde::Serialize;
use thiserror::Error;

/// Message returned for every conversion failure.
pub const CONVERSION_FAILED_MESSAGE: &str = "Error processing the file";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed form fields.
    #[error("{0}")]
    BadRequest(String),

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] NetCdfError),

    /// Task or runtime failure around a conversion.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body sent to the client. Conversion detail is never included.
    pub fn body(&self) -> ErrorBody {
        match self {
            ApiError::BadRequest(message) => ErrorBody {
                error: "Bad Request".to_string(),
                message: message.clone(),
            },
            _ => ErrorBody {
                error: "Internal Server Error".to_string(),
                message: CONVERSION_FAILED_MESSAGE.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let json = serde_json::to_string(&self.body()).unwrap_or_default();
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "application/json")],
            json,
        )
            .into_response()
    }
}
