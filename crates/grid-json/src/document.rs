//! Whole-file JSON documents.
//!
//! Both documents are serialized with `serde_json` under the strict
//! encoder policy into a buffer before anything reaches the caller's
//! writer, so a failure never leaves half a document behind.

use std::cell::RefCell;
use std::io::Write;

use ndarray::ArrayViewD;
use netcdf_parser::{
    dispatch_numeric, Attribute, DatasetReader, Dimension, NcValue, NumericElement, Scalar,
    Variable, VariableInfo,
};
use serde::ser::{SerializeMap, SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::encoder::Encoder;
use crate::error::{ConversionError, ConversionResult};

/// Write the structure of a dataset without reading variable data:
///
/// ```text
/// {"dimensions":{name:len},
///  "variables_metadata":{name:{"dimensions":[..],"attributes":{..}}},
///  "global_attributes":{..}}
/// ```
pub fn write_metadata_document<D, W>(dataset: &D, out: &mut W) -> ConversionResult<()>
where
    D: DatasetReader + ?Sized,
    W: Write,
{
    let buf = metadata_document(dataset)?;
    out.write_all(&buf)?;
    Ok(())
}

/// Write every variable's data in storage axis order:
///
/// ```text
/// {"variables_data":{name:{"dimensions":[..],"data":nested}}}
/// ```
pub fn write_data_document<D, W>(dataset: &D, out: &mut W) -> ConversionResult<()>
where
    D: DatasetReader + ?Sized,
    W: Write,
{
    let buf = data_document(dataset)?;
    out.write_all(&buf)?;
    Ok(())
}

/// Encode the metadata document into a new buffer.
pub fn metadata_document<D>(dataset: &D) -> ConversionResult<Vec<u8>>
where
    D: DatasetReader + ?Sized,
{
    let dimensions = dataset.dimensions()?;
    let variables = dataset.variables()?;
    let global_attributes = dataset.global_attributes()?;

    let ctx = Context::strict();
    let document = MetadataDocument {
        ctx: &ctx,
        dimensions: &dimensions,
        variables: &variables,
        global_attributes: &global_attributes,
    };
    ctx.to_vec(&document)
}

/// Encode the data document into a new buffer.
pub fn data_document<D>(dataset: &D) -> ConversionResult<Vec<u8>>
where
    D: DatasetReader + ?Sized,
{
    let mut variables = Vec::new();
    for name in dataset.variable_names()? {
        if let Some(variable) = dataset.read_variable(&name)? {
            variables.push(variable);
        }
    }

    let ctx = Context::strict();
    let document = DataDocument {
        ctx: &ctx,
        variables: &variables,
    };
    ctx.to_vec(&document)
}

/// Encoder policy plus the first conversion failure hit while serializing.
///
/// `serde` errors only carry a message, so the typed error is kept here
/// and handed back once `serde_json` gives up.
struct Context {
    encoder: Encoder,
    failure: RefCell<Option<ConversionError>>,
}

impl Context {
    fn strict() -> Self {
        Self {
            encoder: Encoder::strict(),
            failure: RefCell::new(None),
        }
    }

    fn fail<E: serde::ser::Error>(&self, error: ConversionError) -> E {
        let message = error.to_string();
        self.failure.borrow_mut().get_or_insert(error);
        E::custom(message)
    }

    fn to_vec<T: Serialize>(&self, document: &T) -> ConversionResult<Vec<u8>> {
        serde_json::to_vec(document)
            .map_err(|e| self.failure.borrow_mut().take().unwrap_or_else(|| e.into()))
    }

    fn float<S: Serializer>(&self, serializer: S, value: f64) -> Result<S::Ok, S::Error> {
        match self.encoder.check_float(value) {
            Ok(value) => serializer.serialize_f64(value),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn scalar<S: Serializer>(&self, serializer: S, value: Scalar) -> Result<S::Ok, S::Error> {
        match value {
            Scalar::I8(v) => serializer.serialize_i8(v),
            Scalar::U8(v) => serializer.serialize_u8(v),
            Scalar::I16(v) => serializer.serialize_i16(v),
            Scalar::U16(v) => serializer.serialize_u16(v),
            Scalar::I32(v) => serializer.serialize_i32(v),
            Scalar::U32(v) => serializer.serialize_u32(v),
            Scalar::I64(v) => serializer.serialize_i64(v),
            Scalar::U64(v) => serializer.serialize_u64(v),
            Scalar::F32(v) => self.float(serializer, v as f64),
            Scalar::F64(v) => self.float(serializer, v),
        }
    }
}

struct MetadataDocument<'a> {
    ctx: &'a Context,
    dimensions: &'a [Dimension],
    variables: &'a [VariableInfo],
    global_attributes: &'a [Attribute],
}

impl Serialize for MetadataDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut doc = serializer.serialize_struct("MetadataDocument", 3)?;
        doc.serialize_field("dimensions", &Dimensions(self.dimensions))?;
        doc.serialize_field(
            "variables_metadata",
            &VariablesMetadata {
                ctx: self.ctx,
                variables: self.variables,
            },
        )?;
        doc.serialize_field(
            "global_attributes",
            &Attributes {
                ctx: self.ctx,
                attributes: self.global_attributes,
            },
        )?;
        doc.end()
    }
}

struct Dimensions<'a>(&'a [Dimension]);

impl Serialize for Dimensions<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for dim in self.0 {
            map.serialize_entry(&dim.name, &dim.len)?;
        }
        map.end()
    }
}

struct VariablesMetadata<'a> {
    ctx: &'a Context,
    variables: &'a [VariableInfo],
}

impl Serialize for VariablesMetadata<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.variables.len()))?;
        for info in self.variables {
            map.serialize_entry(
                &info.name,
                &VariableMetadata {
                    ctx: self.ctx,
                    info,
                },
            )?;
        }
        map.end()
    }
}

struct VariableMetadata<'a> {
    ctx: &'a Context,
    info: &'a VariableInfo,
}

impl Serialize for VariableMetadata<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entry = serializer.serialize_struct("VariableMetadata", 2)?;
        entry.serialize_field("dimensions", &self.info.dimension_names)?;
        entry.serialize_field(
            "attributes",
            &Attributes {
                ctx: self.ctx,
                attributes: &self.info.attributes,
            },
        )?;
        entry.end()
    }
}

struct Attributes<'a> {
    ctx: &'a Context,
    attributes: &'a [Attribute],
}

impl Serialize for Attributes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attributes.len()))?;
        for attr in self.attributes {
            map.serialize_entry(
                &attr.name,
                &EncodedValue {
                    ctx: self.ctx,
                    value: &attr.value,
                },
            )?;
        }
        map.end()
    }
}

struct DataDocument<'a> {
    ctx: &'a Context,
    variables: &'a [Variable],
}

impl Serialize for DataDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut doc = serializer.serialize_struct("DataDocument", 1)?;
        doc.serialize_field(
            "variables_data",
            &VariablesData {
                ctx: self.ctx,
                variables: self.variables,
            },
        )?;
        doc.end()
    }
}

struct VariablesData<'a> {
    ctx: &'a Context,
    variables: &'a [Variable],
}

impl Serialize for VariablesData<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.variables.len()))?;
        for variable in self.variables {
            map.serialize_entry(
                variable.name(),
                &VariableData {
                    ctx: self.ctx,
                    variable,
                },
            )?;
        }
        map.end()
    }
}

struct VariableData<'a> {
    ctx: &'a Context,
    variable: &'a Variable,
}

impl Serialize for VariableData<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entry = serializer.serialize_struct("VariableData", 2)?;
        entry.serialize_field("dimensions", self.variable.dimension_names())?;
        entry.serialize_field(
            "data",
            &EncodedValue {
                ctx: self.ctx,
                value: &self.variable.data,
            },
        )?;
        entry.end()
    }
}

/// One [`NcValue`] under the context's encoder policy.
struct EncodedValue<'a> {
    ctx: &'a Context,
    value: &'a NcValue,
}

impl Serialize for EncodedValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            NcValue::Scalar(s) => self.ctx.scalar(serializer, *s),
            NcValue::Array(array) => dispatch_numeric!(array, a => Nested {
                ctx: self.ctx,
                view: a.view(),
            }
            .serialize(serializer)),
            NcValue::Text(s) => serializer.serialize_str(s),
            NcValue::Texts(items) => serializer.collect_seq(items),
            NcValue::Unsupported(type_name) => {
                Err(self.ctx.fail(ConversionError::UnsupportedType(type_name.clone())))
            }
        }
    }
}

/// Nested lists, one level per axis.
struct Nested<'a, T> {
    ctx: &'a Context,
    view: ArrayViewD<'a, T>,
}

impl<T: NumericElement> Serialize for Nested<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.view.ndim() == 0 {
            return match self.view.first() {
                Some(v) => self.ctx.scalar(serializer, v.into_scalar()),
                None => serializer.serialize_unit(),
            };
        }

        let mut seq = serializer.serialize_seq(Some(self.view.len_of(ndarray::Axis(0))))?;
        for sub in self.view.outer_iter() {
            seq.serialize_element(&Nested {
                ctx: self.ctx,
                view: sub,
            })?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;
    use netcdf_parser::{MemoryDataset, NumericArray, Scalar};
    use serde_json::{json, Value};

    fn dataset() -> MemoryDataset {
        MemoryDataset::new()
            .with_dimension("Time", 1)
            .with_dimension("south_north", 2)
            .with_dimension("west_east", 2)
            .with_attribute("TITLE", "OUTPUT FROM WRF")
            .with_attribute("DX", Scalar::F32(4000.0))
            .with_variable_attrs(
                "T2",
                &["Time", "south_north", "west_east"],
                NumericArray::from_shape_vec(&[1, 2, 2], vec![280.5f32, 281.0, 282.5, 283.0])
                    .unwrap(),
                vec![
                    Attribute::new("units", "K"),
                    Attribute::new("FieldType", Scalar::I32(104)),
                ],
            )
            .unwrap()
            .with_variable(
                "LU_INDEX",
                &["south_north", "west_east"],
                NumericArray::from_shape_vec(&[2, 2], vec![1i32, 2, 3, 4]).unwrap(),
            )
            .unwrap()
    }

    #[test]
    fn test_metadata_document() {
        let mut out = Vec::new();
        write_metadata_document(&dataset(), &mut out).unwrap();
        let doc: Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(
            doc,
            json!({
                "dimensions": {"Time": 1, "south_north": 2, "west_east": 2},
                "variables_metadata": {
                    "T2": {
                        "dimensions": ["Time", "south_north", "west_east"],
                        "attributes": {"units": "K", "FieldType": 104}
                    },
                    "LU_INDEX": {
                        "dimensions": ["south_north", "west_east"],
                        "attributes": {}
                    }
                },
                "global_attributes": {"TITLE": "OUTPUT FROM WRF", "DX": 4000.0}
            })
        );
    }

    #[test]
    fn test_data_document_keeps_storage_order() {
        let mut out = Vec::new();
        write_data_document(&dataset(), &mut out).unwrap();
        let doc: Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(
            doc["variables_data"]["T2"],
            json!({
                "dimensions": ["Time", "south_north", "west_east"],
                "data": [[[280.5, 281.0], [282.5, 283.0]]]
            })
        );
        assert_eq!(doc["variables_data"]["LU_INDEX"]["data"], json!([[1, 2], [3, 4]]));
    }

    #[test]
    fn test_data_document_rejects_nan() {
        let dataset = MemoryDataset::new()
            .with_dimension("x", 2)
            .with_variable(
                "v",
                &["x"],
                NumericArray::from_shape_vec(&[2], vec![1.0f64, f64::NAN]).unwrap(),
            )
            .unwrap();

        let mut out = Vec::new();
        let result = write_data_document(&dataset, &mut out);
        assert!(matches!(result, Err(ConversionError::NonFiniteValue(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_data_document_rejects_unsupported() {
        let dataset = dataset().with_unsupported_variable("Times", &["Time"], "char");

        let mut out = Vec::new();
        let result = write_data_document(&dataset, &mut out);
        assert!(matches!(result, Err(ConversionError::UnsupportedType(ref t)) if t == "char"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_document_numbers_match_encoder() {
        let values = vec![2.2f32, -0.0, 1e-7];
        let dataset = MemoryDataset::new()
            .with_dimension("x", 3)
            .with_attribute("ratio", Scalar::F32(0.1))
            .with_variable(
                "v",
                &["x"],
                NumericArray::from_shape_vec(&[3], values.clone()).unwrap(),
            )
            .unwrap();

        let data = String::from_utf8(data_document(&dataset).unwrap()).unwrap();
        let encoded = Encoder::strict()
            .to_json_string(&NcValue::Array(NumericArray::from_shape_vec(&[3], values).unwrap()))
            .unwrap();
        assert!(data.contains(&format!("\"data\":{}", encoded)), "{}", data);

        let metadata = String::from_utf8(metadata_document(&dataset).unwrap()).unwrap();
        let ratio = Encoder::strict()
            .to_json_string(&NcValue::Scalar(Scalar::F32(0.1)))
            .unwrap();
        assert!(metadata.contains(&format!("\"ratio\":{}", ratio)), "{}", metadata);
    }

    #[test]
    fn test_metadata_of_empty_dataset() {
        let buf = metadata_document(&MemoryDataset::new()).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            r#"{"dimensions":{},"variables_metadata":{},"global_attributes":{}}"#
        );
    }
}
