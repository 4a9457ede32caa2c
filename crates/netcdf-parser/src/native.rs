//! Native NetCDF reading using the netcdf library.
//!
//! # Temp files
//!
//! The netcdf library requires a file path (it wraps libnetcdf/HDF5 which need
//! file handles). When reading from uploaded bytes, we write to a temp file first
//! and keep it alive exactly as long as the open handle.
//!
//! On Linux, we use `/dev/shm` (memory-backed tmpfs) when it is writable to
//! minimize I/O latency.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;

use ndarray::ArrayD;
use netcdf::types::{FloatType, IntType, NcVariableType};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::dataset::{Attribute, DatasetReader, Dimension, Variable, VariableInfo};
use crate::error::{NetCdfError, NetCdfResult};
use crate::value::{NcValue, NumericArray, Scalar};

/// CF packing attributes.
pub const SCALE_FACTOR_ATTR: &str = "scale_factor";
pub const ADD_OFFSET_ATTR: &str = "add_offset";

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully by the Rust code (e.g., when a probe for an optional
/// attribute fails, or when an upload turns out not to be HDF5 at all).
///
/// Call this early in `main()` before any HDF5/NetCDF operations occur. It only
/// needs to run once per process, but is safe to call multiple times.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Options controlling how variable data is decoded.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Apply CF `scale_factor`/`add_offset` unpacking, producing `f64` data.
    pub unpack: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { unpack: true }
    }
}

/// A NetCDF file opened for reading.
///
/// When created from bytes, the dataset owns its temp file; dropping the
/// dataset closes the handle and then deletes the file.
pub struct NetCdfDataset {
    // Field order matters: the handle must close before the temp file is removed.
    file: netcdf::File,
    path: PathBuf,
    options: ReadOptions,
    _temp: Option<NamedTempFile>,
}

impl std::fmt::Debug for NetCdfDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetCdfDataset")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("temporary", &self._temp.is_some())
            .finish()
    }
}

impl NetCdfDataset {
    /// Open an existing file.
    pub fn open(path: impl AsRef<Path>, options: ReadOptions) -> NetCdfResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = netcdf::open(&path)
            .map_err(|e| NetCdfError::InvalidFormat(format!("Failed to open NetCDF: {}", e)))?;

        Ok(Self {
            file,
            path,
            options,
            _temp: None,
        })
    }

    /// Write `data` to a temp file in `temp_dir` and open it.
    ///
    /// The temp file is removed when the returned dataset is dropped, or
    /// immediately if opening fails.
    pub fn from_bytes(data: &[u8], temp_dir: &Path, options: ReadOptions) -> NetCdfResult<Self> {
        silence_hdf5_errors();

        let mut temp = tempfile::Builder::new()
            .prefix("netcdf_upload_")
            .suffix(".nc")
            .tempfile_in(temp_dir)?;
        temp.write_all(data)?;
        temp.flush()?;

        debug!(path = %temp.path().display(), bytes = data.len(), "Wrote upload to temp file");

        let mut dataset = Self::open(temp.path(), options)?;
        dataset._temp = Some(temp);
        Ok(dataset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn info_of(&self, var: &netcdf::Variable<'_>) -> NetCdfResult<VariableInfo> {
        let mut attributes = Vec::new();
        for attr in var.attributes() {
            attributes.push(read_attribute(&attr)?);
        }

        Ok(VariableInfo {
            name: var.name().to_string(),
            dimension_names: var
                .dimensions()
                .iter()
                .map(|d| d.name().to_string())
                .collect(),
            attributes,
        })
    }
}

impl DatasetReader for NetCdfDataset {
    fn dimensions(&self) -> NetCdfResult<Vec<Dimension>> {
        Ok(self
            .file
            .dimensions()
            .map(|d| Dimension::new(d.name().to_string(), d.len()))
            .collect())
    }

    fn global_attributes(&self) -> NetCdfResult<Vec<Attribute>> {
        self.file.attributes().map(|attr| read_attribute(&attr)).collect()
    }

    fn variable_names(&self) -> NetCdfResult<Vec<String>> {
        Ok(self.file.variables().map(|v| v.name().to_string()).collect())
    }

    fn variable_info(&self, name: &str) -> NetCdfResult<Option<VariableInfo>> {
        match self.file.variable(name) {
            Some(var) => self.info_of(&var).map(Some),
            None => Ok(None),
        }
    }

    fn read_variable(&self, name: &str) -> NetCdfResult<Option<Variable>> {
        let Some(var) = self.file.variable(name) else {
            return Ok(None);
        };

        let info = self.info_of(&var)?;
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let fill_value = info.fill_value();

        let data = match read_variable_array(&var, &shape)? {
            NcValue::Array(raw) if self.options.unpack => match unpack_cf(&raw, &info) {
                Some(unpacked) => NcValue::Array(unpacked),
                None => NcValue::Array(raw),
            },
            other => other,
        };

        debug!(
            variable = %info.name,
            shape = ?shape,
            kind = data.type_name(),
            "Read variable data"
        );

        Ok(Some(Variable {
            info,
            data,
            fill_value,
        }))
    }
}

/// Apply CF unpacking (`raw * scale_factor + add_offset`) if the variable is packed.
///
/// The result is `f32` when every packing attribute present is `f32`, and
/// `f64` otherwise. Cells equal to the fill value keep the fill value.
/// Returns `None` when the variable carries neither packing attribute.
pub fn unpack_cf(raw: &NumericArray, info: &VariableInfo) -> Option<NumericArray> {
    let scale = info.attribute(SCALE_FACTOR_ATTR).and_then(NcValue::as_scalar);
    let offset = info.attribute(ADD_OFFSET_ATTR).and_then(NcValue::as_scalar);

    if scale.is_none() && offset.is_none() {
        return None;
    }

    let single_precision = [scale, offset]
        .iter()
        .flatten()
        .all(|attr| matches!(attr, Scalar::F32(_)));
    let scale = scale.map_or(1.0, |s| s.as_f64());
    let offset = offset.map_or(0.0, |s| s.as_f64());
    let fill = info.fill_value().map(|f| f.as_f64());
    let raw = raw.to_f64();

    if single_precision {
        let (scale, offset) = (scale as f32, offset as f32);
        let unpacked: ArrayD<f32> = raw.mapv(|v| {
            if fill == Some(v) {
                v as f32
            } else {
                v as f32 * scale + offset
            }
        });
        return Some(NumericArray::F32(unpacked));
    }

    let unpacked: ArrayD<f64> = raw.mapv(|v| {
        if fill == Some(v) {
            v
        } else {
            v * scale + offset
        }
    });
    Some(NumericArray::F64(unpacked))
}

macro_rules! read_values {
    ($var:expr, $shape:expr, $ty:ty) => {{
        let values: Vec<$ty> = $var.get_values(..).map_err(|e| {
            NetCdfError::InvalidFormat(format!(
                "Failed to read {} data for {}: {}",
                stringify!($ty),
                $var.name(),
                e
            ))
        })?;
        let actual = values.len();
        NumericArray::from_shape_vec($shape, values).map_err(|_| NetCdfError::ShapeMismatch {
            variable: $var.name().to_string(),
            expected: $shape.to_vec(),
            actual,
        })?
    }};
}

fn read_variable_array(var: &netcdf::Variable<'_>, shape: &[usize]) -> NetCdfResult<NcValue> {
    let array = match var.vartype() {
        NcVariableType::Int(IntType::I8) => read_values!(var, shape, i8),
        NcVariableType::Int(IntType::U8) => read_values!(var, shape, u8),
        NcVariableType::Int(IntType::I16) => read_values!(var, shape, i16),
        NcVariableType::Int(IntType::U16) => read_values!(var, shape, u16),
        NcVariableType::Int(IntType::I32) => read_values!(var, shape, i32),
        NcVariableType::Int(IntType::U32) => read_values!(var, shape, u32),
        NcVariableType::Int(IntType::I64) => read_values!(var, shape, i64),
        NcVariableType::Int(IntType::U64) => read_values!(var, shape, u64),
        NcVariableType::Float(FloatType::F32) => read_values!(var, shape, f32),
        NcVariableType::Float(FloatType::F64) => read_values!(var, shape, f64),
        NcVariableType::Char => return Ok(NcValue::Unsupported("char".to_string())),
        NcVariableType::String => return Ok(NcValue::Unsupported("string".to_string())),
        other => return Ok(NcValue::Unsupported(type_label(&other))),
    };
    Ok(NcValue::Array(array))
}

/// Short label for a user-defined type, e.g. `compound` or `vlen`.
fn type_label(vartype: &NcVariableType) -> String {
    let debug = format!("{:?}", vartype);
    debug
        .split(|c: char| !c.is_alphanumeric())
        .next()
        .unwrap_or("unknown")
        .to_lowercase()
}

fn read_attribute(attr: &netcdf::Attribute<'_>) -> NetCdfResult<Attribute> {
    use netcdf::AttributeValue;

    let name = attr.name().to_string();
    let value = attr
        .value()
        .map_err(|e| NetCdfError::InvalidFormat(format!("Failed to read attribute {}: {}", name, e)))?;

    let value = match value {
        AttributeValue::Uchar(v) => NcValue::Scalar(Scalar::U8(v)),
        AttributeValue::Schar(v) => NcValue::Scalar(Scalar::I8(v)),
        AttributeValue::Ushort(v) => NcValue::Scalar(Scalar::U16(v)),
        AttributeValue::Short(v) => NcValue::Scalar(Scalar::I16(v)),
        AttributeValue::Uint(v) => NcValue::Scalar(Scalar::U32(v)),
        AttributeValue::Int(v) => NcValue::Scalar(Scalar::I32(v)),
        AttributeValue::Ulonglong(v) => NcValue::Scalar(Scalar::U64(v)),
        AttributeValue::Longlong(v) => NcValue::Scalar(Scalar::I64(v)),
        AttributeValue::Float(v) => NcValue::Scalar(Scalar::F32(v)),
        AttributeValue::Double(v) => NcValue::Scalar(Scalar::F64(v)),
        AttributeValue::Str(v) => NcValue::Text(v),
        AttributeValue::Uchars(v) => attribute_array(v)?,
        AttributeValue::Schars(v) => attribute_array(v)?,
        AttributeValue::Ushorts(v) => attribute_array(v)?,
        AttributeValue::Shorts(v) => attribute_array(v)?,
        AttributeValue::Uints(v) => attribute_array(v)?,
        AttributeValue::Ints(v) => attribute_array(v)?,
        AttributeValue::Ulonglongs(v) => attribute_array(v)?,
        AttributeValue::Longlongs(v) => attribute_array(v)?,
        AttributeValue::Floats(v) => attribute_array(v)?,
        AttributeValue::Doubles(v) => attribute_array(v)?,
        AttributeValue::Strs(v) => NcValue::Texts(v),
    };

    Ok(Attribute { name, value })
}

fn attribute_array<T: crate::value::NumericElement>(values: Vec<T>) -> NetCdfResult<NcValue> {
    let len = values.len();
    NumericArray::from_shape_vec(&[len], values).map(NcValue::Array)
}

/// Get the optimal temp directory for NetCDF file operations.
///
/// On Linux, uses /dev/shm (memory-backed tmpfs) if available for faster I/O.
/// Falls back to the system temp directory on other platforms or if /dev/shm is unavailable.
pub fn default_temp_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let shm_path = Path::new("/dev/shm");
        if shm_path.is_dir() {
            // Verify we can write to /dev/shm
            let test_path = shm_path.join(format!(".netcdf_test_{}", std::process::id()));
            if std::fs::write(&test_path, b"test").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return shm_path.to_path_buf();
            }
        }
    }

    std::env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed_info(attrs: Vec<Attribute>) -> VariableInfo {
        VariableInfo {
            name: "packed".to_string(),
            dimension_names: vec!["x".to_string()],
            attributes: attrs,
        }
    }

    #[test]
    fn test_default_temp_dir_exists() {
        let dir = default_temp_dir();
        assert!(dir.exists(), "Temp dir should exist");
    }

    #[test]
    fn test_unpack_cf_applies_scale_and_offset() {
        let raw = NumericArray::from_shape_vec(&[3], vec![0i16, 10, -1]).unwrap();
        let info = packed_info(vec![
            Attribute::new(SCALE_FACTOR_ATTR, Scalar::F64(0.5)),
            Attribute::new(ADD_OFFSET_ATTR, Scalar::F64(100.0)),
            Attribute::new("_FillValue", Scalar::I16(-1)),
        ]);

        let unpacked = unpack_cf(&raw, &info).unwrap();
        assert_eq!(unpacked.get(&[0]), Some(Scalar::F64(100.0)));
        assert_eq!(unpacked.get(&[1]), Some(Scalar::F64(105.0)));
        // fill cells are left as the fill value
        assert_eq!(unpacked.get(&[2]), Some(Scalar::F64(-1.0)));
    }

    #[test]
    fn test_unpack_cf_keeps_single_precision_packing() {
        let raw = NumericArray::from_shape_vec(&[3], vec![0i16, 10, -1]).unwrap();
        let info = packed_info(vec![
            Attribute::new(SCALE_FACTOR_ATTR, Scalar::F32(0.1)),
            Attribute::new(ADD_OFFSET_ATTR, Scalar::F32(100.0)),
            Attribute::new("_FillValue", Scalar::I16(-1)),
        ]);

        let unpacked = unpack_cf(&raw, &info).unwrap();
        assert_eq!(unpacked.type_name(), "float");
        assert_eq!(unpacked.get(&[1]), Some(Scalar::F32(10.0f32 * 0.1f32 + 100.0f32)));
        assert_eq!(unpacked.get(&[2]), Some(Scalar::F32(-1.0)));
    }

    #[test]
    fn test_unpack_cf_mixed_precision_widens() {
        let raw = NumericArray::from_shape_vec(&[1], vec![4i16]).unwrap();
        let info = packed_info(vec![
            Attribute::new(SCALE_FACTOR_ATTR, Scalar::F32(0.5)),
            Attribute::new(ADD_OFFSET_ATTR, Scalar::F64(1000.0)),
        ]);

        let unpacked = unpack_cf(&raw, &info).unwrap();
        assert_eq!(unpacked.get(&[0]), Some(Scalar::F64(1002.0)));
    }

    #[test]
    fn test_unpack_cf_without_packing_attributes() {
        let raw = NumericArray::from_shape_vec(&[2], vec![1.0f32, 2.0]).unwrap();
        assert!(unpack_cf(&raw, &packed_info(vec![])).is_none());
    }

    #[test]
    fn test_from_bytes_rejects_garbage_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let result = NetCdfDataset::from_bytes(b"not a netcdf file", dir.path(), ReadOptions::default());

        assert!(matches!(result, Err(NetCdfError::InvalidFormat(_))));
        let leftover = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftover, 0, "temp upload should be removed on failure");
    }
}
