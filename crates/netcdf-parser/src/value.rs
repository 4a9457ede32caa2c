//! Value kinds surfaced by the dataset reader.
//!
//! NetCDF stores numbers in ten fixed-width element types. They are kept
//! distinct here (rather than widened to `f64` on read) so that the JSON
//! encoder can decide per kind how a value is written.

use std::fmt;

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Slice};

use crate::error::{NetCdfError, NetCdfResult};

/// Runs `$body` with `$arr` bound to the typed `ArrayD` inside a [`NumericArray`].
#[macro_export]
macro_rules! dispatch_numeric {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            $crate::NumericArray::I8($arr) => $body,
            $crate::NumericArray::U8($arr) => $body,
            $crate::NumericArray::I16($arr) => $body,
            $crate::NumericArray::U16($arr) => $body,
            $crate::NumericArray::I32($arr) => $body,
            $crate::NumericArray::U32($arr) => $body,
            $crate::NumericArray::I64($arr) => $body,
            $crate::NumericArray::U64($arr) => $body,
            $crate::NumericArray::F32($arr) => $body,
            $crate::NumericArray::F64($arr) => $body,
        }
    };
}

/// Like [`dispatch_numeric!`], but re-wraps the resulting array in the same variant.
macro_rules! map_numeric {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            NumericArray::I8($arr) => NumericArray::I8($body),
            NumericArray::U8($arr) => NumericArray::U8($body),
            NumericArray::I16($arr) => NumericArray::I16($body),
            NumericArray::U16($arr) => NumericArray::U16($body),
            NumericArray::I32($arr) => NumericArray::I32($body),
            NumericArray::U32($arr) => NumericArray::U32($body),
            NumericArray::I64($arr) => NumericArray::I64($body),
            NumericArray::U64($arr) => NumericArray::U64($body),
            NumericArray::F32($arr) => NumericArray::F32($body),
            NumericArray::F64($arr) => NumericArray::F64($body),
        }
    };
}

/// A single numeric value of one of the NetCDF element types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    /// CDL name of the element type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::I8(_) => i8::TYPE_NAME,
            Scalar::U8(_) => u8::TYPE_NAME,
            Scalar::I16(_) => i16::TYPE_NAME,
            Scalar::U16(_) => u16::TYPE_NAME,
            Scalar::I32(_) => i32::TYPE_NAME,
            Scalar::U32(_) => u32::TYPE_NAME,
            Scalar::I64(_) => i64::TYPE_NAME,
            Scalar::U64(_) => u64::TYPE_NAME,
            Scalar::F32(_) => f32::TYPE_NAME,
            Scalar::F64(_) => f64::TYPE_NAME,
        }
    }

    /// Lossy conversion used for arithmetic (CF unpacking, fill comparison).
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::I8(v) => v as f64,
            Scalar::U8(v) => v as f64,
            Scalar::I16(v) => v as f64,
            Scalar::U16(v) => v as f64,
            Scalar::I32(v) => v as f64,
            Scalar::U32(v) => v as f64,
            Scalar::I64(v) => v as f64,
            Scalar::U64(v) => v as f64,
            Scalar::F32(v) => v as f64,
            Scalar::F64(v) => v,
        }
    }
}

/// Element types that can live in a [`NumericArray`].
pub trait NumericElement: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// CDL name of the element type.
    const TYPE_NAME: &'static str;

    fn into_scalar(self) -> Scalar;

    fn into_array(array: ArrayD<Self>) -> NumericArray;

    fn to_f64(self) -> f64;
}

macro_rules! impl_numeric_element {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {
        $(
            impl NumericElement for $ty {
                const TYPE_NAME: &'static str = $name;

                fn into_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }

                fn into_array(array: ArrayD<Self>) -> NumericArray {
                    NumericArray::$variant(array)
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }

            impl From<ArrayD<$ty>> for NumericArray {
                fn from(array: ArrayD<$ty>) -> Self {
                    NumericArray::$variant(array)
                }
            }

            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::$variant(value)
                }
            }
        )*
    };
}

impl_numeric_element! {
    i8 => I8, "byte";
    u8 => U8, "ubyte";
    i16 => I16, "short";
    u16 => U16, "ushort";
    i32 => I32, "int";
    u32 => U32, "uint";
    i64 => I64, "int64";
    u64 => U64, "uint64";
    f32 => F32, "float";
    f64 => F64, "double";
}

/// A dense N-dimensional array of one numeric element type.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    I8(ArrayD<i8>),
    U8(ArrayD<u8>),
    I16(ArrayD<i16>),
    U16(ArrayD<u16>),
    I32(ArrayD<i32>),
    U32(ArrayD<u32>),
    I64(ArrayD<i64>),
    U64(ArrayD<u64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

impl NumericArray {
    /// Build an array from row-major values and a shape.
    pub fn from_shape_vec<T: NumericElement>(shape: &[usize], values: Vec<T>) -> NetCdfResult<Self> {
        let actual = values.len();
        ArrayD::from_shape_vec(IxDyn(shape), values)
            .map(T::into_array)
            .map_err(|_| NetCdfError::ShapeMismatch {
                variable: String::new(),
                expected: shape.to_vec(),
                actual,
            })
    }

    pub fn shape(&self) -> &[usize] {
        dispatch_numeric!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn len_of(&self, axis: usize) -> usize {
        self.shape().get(axis).copied().unwrap_or(0)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NumericArray::I8(_) => i8::TYPE_NAME,
            NumericArray::U8(_) => u8::TYPE_NAME,
            NumericArray::I16(_) => i16::TYPE_NAME,
            NumericArray::U16(_) => u16::TYPE_NAME,
            NumericArray::I32(_) => i32::TYPE_NAME,
            NumericArray::U32(_) => u32::TYPE_NAME,
            NumericArray::I64(_) => i64::TYPE_NAME,
            NumericArray::U64(_) => u64::TYPE_NAME,
            NumericArray::F32(_) => f32::TYPE_NAME,
            NumericArray::F64(_) => f64::TYPE_NAME,
        }
    }

    /// Reorder axes so that new axis `i` is old axis `permutation[i]`.
    ///
    /// # Panics
    ///
    /// Panics if `permutation` is not a permutation of `0..ndim`.
    pub fn permuted_axes(self, permutation: &[usize]) -> Self {
        map_numeric!(self, a => a.permuted_axes(IxDyn(permutation)).as_standard_layout().into_owned())
    }

    /// Keep `start..end` with the given step along one axis.
    ///
    /// Bounds are clamped to the axis length; `start > end` yields an empty axis.
    pub fn slice_axis(mut self, axis: usize, start: usize, end: usize, step: usize) -> Self {
        let len = self.len_of(axis);
        let end = end.min(len);
        let start = start.min(end);
        let slice = Slice::new(start as isize, Some(end as isize), step.max(1) as isize);
        dispatch_numeric!(&mut self, a => a.slice_axis_inplace(Axis(axis), slice));
        self
    }

    /// Fix the given `(axis, index)` pairs and return what remains.
    ///
    /// A fully indexed array collapses to a [`Scalar`]; otherwise the
    /// remaining axes come back as an owned array. `None` when an axis or
    /// index is out of range.
    pub fn pick(&self, picks: &[(usize, usize)]) -> Option<NcValue> {
        dispatch_numeric!(self, a => pick_axes(a.view(), picks))
    }

    /// Element at a full-rank index.
    pub fn get(&self, index: &[usize]) -> Option<Scalar> {
        dispatch_numeric!(self, a => a.get(IxDyn(index)).map(|v| v.into_scalar()))
    }

    /// Convert every element to `f64`.
    pub fn to_f64(&self) -> ArrayD<f64> {
        dispatch_numeric!(self, a => a.mapv(|v| v.to_f64()))
    }
}

fn pick_axes<T: NumericElement>(view: ArrayViewD<'_, T>, picks: &[(usize, usize)]) -> Option<NcValue> {
    let mut sorted = picks.to_vec();
    // Remove the highest axes first so lower axis numbers stay valid.
    sorted.sort_by(|a, b| b.0.cmp(&a.0));

    let mut view = view;
    for (axis, index) in sorted {
        if axis >= view.ndim() || index >= view.len_of(Axis(axis)) {
            return None;
        }
        view = view.index_axis_move(Axis(axis), index);
    }

    if view.ndim() == 0 {
        view.first().map(|v| NcValue::Scalar(v.into_scalar()))
    } else {
        Some(NcValue::Array(T::into_array(view.to_owned())))
    }
}

/// Any value the reader can surface: attribute values and variable data.
#[derive(Debug, Clone, PartialEq)]
pub enum NcValue {
    Scalar(Scalar),
    Array(NumericArray),
    Text(String),
    Texts(Vec<String>),
    /// A NetCDF type with no numeric or text representation
    /// (compound, opaque, enum, vlen, char arrays).
    Unsupported(String),
}

impl NcValue {
    pub fn type_name(&self) -> &str {
        match self {
            NcValue::Scalar(s) => s.type_name(),
            NcValue::Array(a) => a.type_name(),
            NcValue::Text(_) => "string",
            NcValue::Texts(_) => "string[]",
            NcValue::Unsupported(name) => name,
        }
    }

    pub fn as_array(&self) -> Option<&NumericArray> {
        match self {
            NcValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            NcValue::Scalar(s) => Some(*s),
            NcValue::Array(a) if a.shape().iter().product::<usize>() == 1 => {
                let index = vec![0; a.ndim()];
                a.get(&index)
            }
            _ => None,
        }
    }
}

impl From<Scalar> for NcValue {
    fn from(value: Scalar) -> Self {
        NcValue::Scalar(value)
    }
}

impl From<NumericArray> for NcValue {
    fn from(value: NumericArray) -> Self {
        NcValue::Array(value)
    }
}

impl From<&str> for NcValue {
    fn from(value: &str) -> Self {
        NcValue::Text(value.to_string())
    }
}

impl From<String> for NcValue {
    fn from(value: String) -> Self {
        NcValue::Text(value)
    }
}
