//! JSON encoding of dataset values.
//!
//! `serde_json` cannot write non-finite floats, and the grid stream has to
//! (fill cells are frequently NaN), so values are written as JSON text
//! directly. `serde_json` is still used for the pieces it handles natively:
//! string escaping and shortest round-trip float formatting.
//!
//! Rules, in order:
//! 1. a numeric array becomes nested lists, one level per axis;
//! 2. a single-precision float becomes a general (double) float;
//! 3. a fixed-width integer becomes a general integer;
//! 4. anything else fails with [`ConversionError::UnsupportedType`].

use std::io::Write;

use ndarray::ArrayViewD;
use netcdf_parser::{dispatch_numeric, NcValue, NumericArray, NumericElement, Scalar};

use crate::error::{ConversionError, ConversionResult};

/// How non-finite floats are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingMode {
    /// Standard JSON: NaN and infinities fail the encode.
    Strict,
    /// NaN and infinities are written as the `NaN`, `Infinity` and
    /// `-Infinity` tokens accepted by most JSON parsers in lenient mode.
    Permissive,
}

/// Writes [`NcValue`]s as JSON text in a fixed [`EncodingMode`].
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    mode: EncodingMode,
}

impl Encoder {
    pub const fn new(mode: EncodingMode) -> Self {
        Self { mode }
    }

    pub const fn strict() -> Self {
        Self::new(EncodingMode::Strict)
    }

    pub const fn permissive() -> Self {
        Self::new(EncodingMode::Permissive)
    }

    /// Encode a value into a fresh string.
    pub fn to_json_string(&self, value: &NcValue) -> ConversionResult<String> {
        let mut out = Vec::new();
        self.write_value(&mut out, value)?;
        // The encoder only ever writes UTF-8.
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn write_value<W: Write>(&self, out: &mut W, value: &NcValue) -> ConversionResult<()> {
        match value {
            NcValue::Scalar(s) => self.write_scalar(out, *s),
            NcValue::Array(a) => self.write_array(out, a),
            NcValue::Text(s) => self.write_str(out, s),
            NcValue::Texts(items) => {
                out.write_all(b"[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.write_all(b",")?;
                    }
                    self.write_str(out, item)?;
                }
                out.write_all(b"]")?;
                Ok(())
            }
            NcValue::Unsupported(type_name) => {
                Err(ConversionError::UnsupportedType(type_name.clone()))
            }
        }
    }

    pub fn write_scalar<W: Write>(&self, out: &mut W, value: Scalar) -> ConversionResult<()> {
        match value {
            Scalar::I8(v) => write!(out, "{}", v)?,
            Scalar::U8(v) => write!(out, "{}", v)?,
            Scalar::I16(v) => write!(out, "{}", v)?,
            Scalar::U16(v) => write!(out, "{}", v)?,
            Scalar::I32(v) => write!(out, "{}", v)?,
            Scalar::U32(v) => write!(out, "{}", v)?,
            Scalar::I64(v) => write!(out, "{}", v)?,
            Scalar::U64(v) => write!(out, "{}", v)?,
            Scalar::F32(v) => self.write_float(out, v as f64)?,
            Scalar::F64(v) => self.write_float(out, v)?,
        }
        Ok(())
    }

    pub fn write_array<W: Write>(&self, out: &mut W, array: &NumericArray) -> ConversionResult<()> {
        dispatch_numeric!(array, a => self.write_nested(out, a.view()))
    }

    /// Write a JSON string.
    ///
    /// `|` is written as `\u007c` so that no encoded string can contain the
    /// record delimiter. The decoded value is unchanged.
    pub fn write_str<W: Write>(&self, out: &mut W, value: &str) -> ConversionResult<()> {
        let encoded = serde_json::to_string(value)?;
        if encoded.contains('|') {
            out.write_all(encoded.replace('|', "\\u007c").as_bytes())?;
        } else {
            out.write_all(encoded.as_bytes())?;
        }
        Ok(())
    }

    pub fn write_null<W: Write>(&self, out: &mut W) -> ConversionResult<()> {
        out.write_all(b"null")?;
        Ok(())
    }

    /// Apply the mode's non-finite policy: strict mode rejects NaN and the
    /// infinities, permissive mode lets them through.
    pub fn check_float(&self, value: f64) -> ConversionResult<f64> {
        match self.mode {
            EncodingMode::Strict if !value.is_finite() => Err(ConversionError::NonFiniteValue(value)),
            _ => Ok(value),
        }
    }

    fn write_float<W: Write>(&self, out: &mut W, value: f64) -> ConversionResult<()> {
        let value = self.check_float(value)?;
        if value.is_finite() {
            serde_json::to_writer(&mut *out, &value)?;
            return Ok(());
        }

        let token: &[u8] = if value.is_nan() {
            b"NaN"
        } else if value.is_sign_positive() {
            b"Infinity"
        } else {
            b"-Infinity"
        };
        out.write_all(token)?;
        Ok(())
    }

    fn write_nested<T: NumericElement, W: Write>(
        &self,
        out: &mut W,
        view: ArrayViewD<'_, T>,
    ) -> ConversionResult<()> {
        if view.ndim() == 0 {
            return match view.first() {
                Some(v) => self.write_scalar(out, v.into_scalar()),
                None => self.write_null(out),
            };
        }

        out.write_all(b"[")?;
        for (i, sub) in view.outer_iter().enumerate() {
            if i > 0 {
                out.write_all(b",")?;
            }
            self.write_nested(out, sub)?;
        }
        out.write_all(b"]")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array<T: NumericElement>(shape: &[usize], values: Vec<T>) -> NcValue {
        NcValue::Array(NumericArray::from_shape_vec(shape, values).unwrap())
    }

    #[test]
    fn test_encode_f32_array() {
        let json = Encoder::strict()
            .to_json_string(&array(&[3], vec![1.5f32, 2.2, 4.4]))
            .unwrap();
        let parsed: Vec<f64> = serde_json::from_str(&json).unwrap();

        let expected = [1.5, 2.2, 4.4];
        assert_eq!(parsed.len(), expected.len());
        for (got, want) in parsed.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_encode_i32_array() {
        let json = Encoder::strict()
            .to_json_string(&array(&[3], vec![10i32, 20, 30]))
            .unwrap();
        assert_eq!(json, "[10,20,30]");
    }

    #[test]
    fn test_encode_f32_scalar() {
        let json = Encoder::strict()
            .to_json_string(&NcValue::Scalar(Scalar::F32(1.5)))
            .unwrap();
        assert_eq!(json, "1.5");
    }

    #[test]
    fn test_encode_i32_scalar() {
        let json = Encoder::strict()
            .to_json_string(&NcValue::Scalar(Scalar::I32(10)))
            .unwrap();
        assert_eq!(json, "10");
    }

    #[test]
    fn test_encode_unsupported_composite() {
        let result = Encoder::strict().to_json_string(&NcValue::Unsupported("compound".to_string()));
        assert!(matches!(result, Err(ConversionError::UnsupportedType(t)) if t == "compound"));
    }

    #[test]
    fn test_encode_nested_array() {
        let json = Encoder::strict()
            .to_json_string(&array(&[2, 2], vec![1u8, 2, 3, 4]))
            .unwrap();
        assert_eq!(json, "[[1,2],[3,4]]");
    }

    #[test]
    fn test_encode_empty_axis() {
        let json = Encoder::strict()
            .to_json_string(&array::<f64>(&[2, 0], vec![]))
            .unwrap();
        assert_eq!(json, "[[],[]]");
    }

    #[test]
    fn test_encode_extreme_integers() {
        let encoder = Encoder::strict();
        assert_eq!(
            encoder.to_json_string(&NcValue::Scalar(Scalar::U64(u64::MAX))).unwrap(),
            "18446744073709551615"
        );
        assert_eq!(
            encoder.to_json_string(&NcValue::Scalar(Scalar::I64(i64::MIN))).unwrap(),
            "-9223372036854775808"
        );
    }

    #[test]
    fn test_strict_rejects_nan() {
        let result = Encoder::strict().to_json_string(&array(&[2], vec![1.0f32, f32::NAN]));
        assert!(matches!(result, Err(ConversionError::NonFiniteValue(_))));
    }

    #[test]
    fn test_permissive_writes_non_finite_tokens() {
        let json = Encoder::permissive()
            .to_json_string(&array(&[3], vec![f64::NAN, f64::INFINITY, f64::NEG_INFINITY]))
            .unwrap();
        assert_eq!(json, "[NaN,Infinity,-Infinity]");
    }

    #[test]
    fn test_text_values() {
        let encoder = Encoder::strict();
        assert_eq!(encoder.to_json_string(&NcValue::from("K")).unwrap(), "\"K\"");
        assert_eq!(
            encoder
                .to_json_string(&NcValue::Texts(vec!["a".into(), "b\"c".into()]))
                .unwrap(),
            r#"["a","b\"c"]"#
        );
    }

    #[test]
    fn test_pipes_are_escaped() {
        let original = "left||*split*||right";
        let json = Encoder::strict().to_json_string(&NcValue::from(original)).unwrap();

        assert!(!json.contains('|'));
        let decoded: String = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, original);
    }
}
