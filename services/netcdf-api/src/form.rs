//! Multipart form parsing.
//!
//! Form fields are read once at the boundary into typed values; handlers
//! never look at raw strings.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use axum::extract::Multipart;
use bytes::Bytes;
use grid_json::{IndexRange, Selection};

use crate::error::ApiError;

pub const FILE_FIELD: &str = "file";
pub const VARIABLES_FIELD: &str = "filter_variables";
pub const LONGITUDE_RANGE_FIELD: &str = "longitude_range";
pub const LATITUDE_RANGE_FIELD: &str = "latitude_range";
pub const STEP_SIZE_FIELD: &str = "step_size";

/// Every field of a multipart body, untyped.
#[derive(Debug, Default)]
pub struct RawForm {
    pub file: Option<Bytes>,
    pub file_name: Option<String>,
    pub fields: HashMap<String, String>,
}

impl RawForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = RawForm::default();

        while let Some(field) = multipart.next_field().await.map_err(invalid_body)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == FILE_FIELD {
                form.file_name = field.file_name().map(str::to_string);
                form.file = Some(field.bytes().await.map_err(invalid_body)?);
            } else {
                let value = field.text().await.map_err(invalid_body)?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn with_file(mut self, data: impl Into<Bytes>) -> Self {
        self.file = Some(data.into());
        self
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn take_file(&mut self) -> Result<Bytes, ApiError> {
        self.file.take().ok_or_else(|| missing(FILE_FIELD))
    }
}

/// Body of the whole-document endpoints.
#[derive(Debug)]
pub struct UploadForm {
    pub file: Bytes,
    pub file_name: Option<String>,
}

impl UploadForm {
    pub async fn from_multipart(multipart: Multipart) -> Result<Self, ApiError> {
        Self::from_raw(RawForm::from_multipart(multipart).await?)
    }

    pub fn from_raw(mut raw: RawForm) -> Result<Self, ApiError> {
        Ok(Self {
            file: raw.take_file()?,
            file_name: raw.file_name.take(),
        })
    }
}

/// Body of the grid-chunk endpoint.
#[derive(Debug)]
pub struct GridChunkForm {
    pub file: Bytes,
    pub file_name: Option<String>,
    pub variables: Vec<String>,
    /// From `longitude_range`, applied to `west_east`.
    pub x_range: Option<IndexRange>,
    /// From `latitude_range`, applied to `south_north`.
    pub y_range: Option<IndexRange>,
    pub stride: NonZeroUsize,
}

impl GridChunkForm {
    pub async fn from_multipart(multipart: Multipart) -> Result<Self, ApiError> {
        Self::from_raw(RawForm::from_multipart(multipart).await?)
    }

    pub fn from_raw(mut raw: RawForm) -> Result<Self, ApiError> {
        let file = raw.take_file()?;
        let variables = parse_variables(raw.field(VARIABLES_FIELD).ok_or_else(|| missing(VARIABLES_FIELD))?);
        let x_range = parse_range(LONGITUDE_RANGE_FIELD, raw.field(LONGITUDE_RANGE_FIELD))?;
        let y_range = parse_range(LATITUDE_RANGE_FIELD, raw.field(LATITUDE_RANGE_FIELD))?;
        let stride = parse_stride(raw.field(STEP_SIZE_FIELD).ok_or_else(|| missing(STEP_SIZE_FIELD))?)?;

        Ok(Self {
            file,
            file_name: raw.file_name.take(),
            variables,
            x_range,
            y_range,
            stride,
        })
    }

    pub fn selection(&self) -> Selection {
        Selection {
            variables: self.variables.clone(),
            x_range: self.x_range,
            y_range: self.y_range,
            stride: self.stride,
        }
    }
}

/// Split a comma separated name list. Names are trimmed, empty names
/// dropped, and a repeated name keeps its first position.
pub fn parse_variables(value: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in value.split(',').map(str::trim) {
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Parse `"lo,hi"`. An absent or blank value means the whole axis.
pub fn parse_range(field: &str, value: Option<&str>) -> Result<Option<IndexRange>, ApiError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let bounds: Vec<&str> = value.split(',').map(str::trim).collect();
    match bounds.as_slice() {
        [lo, hi] => match (lo.parse::<usize>(), hi.parse::<usize>()) {
            (Ok(lo), Ok(hi)) => Ok(Some(IndexRange::new(lo, hi))),
            _ => Err(bad_range(field)),
        },
        _ => Err(bad_range(field)),
    }
}

pub fn parse_stride(value: &str) -> Result<NonZeroUsize, ApiError> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| ApiError::BadRequest(format!("{} must be a positive integer", STEP_SIZE_FIELD)))
}

fn missing(field: &str) -> ApiError {
    ApiError::BadRequest(format!("Missing required field: {}", field))
}

fn bad_range(field: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "{} must be two non-negative integers \"lo,hi\"",
        field
    ))
}

fn invalid_body(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Invalid multipart body: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_form() -> RawForm {
        RawForm::default()
            .with_file(&b"CDF"[..])
            .with_field(VARIABLES_FIELD, "T2,HGT")
            .with_field(STEP_SIZE_FIELD, "1")
    }

    #[test]
    fn test_parse_variables_trims_and_drops_empty() {
        assert_eq!(parse_variables(" T2 , ,HGT,"), vec!["T2", "HGT"]);
        assert!(parse_variables("").is_empty());
        assert_eq!(parse_variables("HGT,T2, HGT"), vec!["HGT", "T2"]);
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(
            parse_range(LONGITUDE_RANGE_FIELD, Some("2, 8")).unwrap(),
            Some(IndexRange::new(2, 8))
        );
        assert_eq!(parse_range(LONGITUDE_RANGE_FIELD, None).unwrap(), None);
        assert_eq!(parse_range(LONGITUDE_RANGE_FIELD, Some("  ")).unwrap(), None);
    }

    #[test]
    fn test_parse_range_rejects_malformed() {
        for value in ["-1,4", "1", "1,2,3", "a,b", "1.5,2"] {
            let result = parse_range(LATITUDE_RANGE_FIELD, Some(value));
            assert!(
                matches!(result, Err(ApiError::BadRequest(ref m)) if m.contains(LATITUDE_RANGE_FIELD)),
                "{} should be rejected",
                value
            );
        }
    }

    #[test]
    fn test_parse_stride() {
        assert_eq!(parse_stride(" 3 ").unwrap().get(), 3);
        assert!(parse_stride("0").is_err());
        assert!(parse_stride("-2").is_err());
        assert!(parse_stride("two").is_err());
    }

    #[test]
    fn test_grid_chunk_form() {
        let form = GridChunkForm::from_raw(
            grid_form()
                .with_field(LONGITUDE_RANGE_FIELD, "0,5")
                .with_field(STEP_SIZE_FIELD, "2"),
        )
        .unwrap();

        assert_eq!(form.variables, vec!["T2", "HGT"]);
        assert_eq!(form.x_range, Some(IndexRange::new(0, 5)));
        assert_eq!(form.y_range, None);

        let selection = form.selection();
        assert_eq!(selection.stride.get(), 2);
        assert_eq!(selection.x_range, Some(IndexRange::new(0, 5)));
    }

    #[test]
    fn test_grid_chunk_form_requires_fields() {
        let no_file = RawForm::default()
            .with_field(VARIABLES_FIELD, "T2")
            .with_field(STEP_SIZE_FIELD, "1");
        assert!(matches!(GridChunkForm::from_raw(no_file), Err(ApiError::BadRequest(_))));

        let mut no_step = grid_form();
        no_step.fields.remove(STEP_SIZE_FIELD);
        assert!(matches!(GridChunkForm::from_raw(no_step), Err(ApiError::BadRequest(_))));

        let mut no_vars = grid_form();
        no_vars.fields.remove(VARIABLES_FIELD);
        assert!(matches!(GridChunkForm::from_raw(no_vars), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_empty_variable_list_is_allowed() {
        let form = GridChunkForm::from_raw(grid_form().with_field(VARIABLES_FIELD, "")).unwrap();
        assert!(form.variables.is_empty());
    }

    #[test]
    fn test_upload_form() {
        let form = UploadForm::from_raw(RawForm::default().with_file(&b"CDF"[..])).unwrap();
        assert_eq!(&form.file[..], b"CDF");
        assert!(UploadForm::from_raw(RawForm::default()).is_err());
    }
}
