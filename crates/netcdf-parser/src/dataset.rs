//! Dataset model and the read-only reader trait.

use crate::error::{NetCdfError, NetCdfResult};
use crate::value::{NcValue, NumericArray, Scalar};

/// Attribute name holding the per-variable fill value.
pub const FILL_VALUE_ATTR: &str = "_FillValue";

/// A named dimension and its current length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
}

impl Dimension {
    pub fn new(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            len,
        }
    }
}

/// A named attribute value.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: NcValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<NcValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Variable metadata, available without reading any data.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    /// Dimension names in storage order.
    pub dimension_names: Vec<String>,
    pub attributes: Vec<Attribute>,
}

impl VariableInfo {
    pub fn attribute(&self, name: &str) -> Option<&NcValue> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| &attr.value)
    }

    /// The `_FillValue` attribute, if it holds a single number.
    pub fn fill_value(&self) -> Option<Scalar> {
        self.attribute(FILL_VALUE_ATTR).and_then(NcValue::as_scalar)
    }
}

/// A variable with its data loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub info: VariableInfo,
    /// Dense data in storage axis order. Missing cells hold the fill value.
    pub data: NcValue,
    pub fill_value: Option<Scalar>,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn dimension_names(&self) -> &[String] {
        &self.info.dimension_names
    }
}

/// Read-only access to a dataset's structure and contents.
///
/// Implementations return dimensions, variables and attributes in file
/// order. Variable data is only read by [`DatasetReader::read_variable`].
pub trait DatasetReader {
    fn dimensions(&self) -> NetCdfResult<Vec<Dimension>>;

    fn global_attributes(&self) -> NetCdfResult<Vec<Attribute>>;

    fn variable_names(&self) -> NetCdfResult<Vec<String>>;

    /// Metadata for one variable, `None` if the dataset has no such variable.
    fn variable_info(&self, name: &str) -> NetCdfResult<Option<VariableInfo>>;

    /// Metadata and data for one variable, `None` if the dataset has no such variable.
    fn read_variable(&self, name: &str) -> NetCdfResult<Option<Variable>>;

    /// Metadata for every variable in file order.
    fn variables(&self) -> NetCdfResult<Vec<VariableInfo>> {
        let mut infos = Vec::new();
        for name in self.variable_names()? {
            if let Some(info) = self.variable_info(&name)? {
                infos.push(info);
            }
        }
        Ok(infos)
    }
}

/// A dataset held entirely in memory.
///
/// Used for synthetic data and in tests; behaves like a file-backed
/// dataset that has already been read.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    dimensions: Vec<Dimension>,
    attributes: Vec<Attribute>,
    variables: Vec<Variable>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a dimension. Redeclaring a name replaces its length.
    pub fn with_dimension(mut self, name: impl Into<String>, len: usize) -> Self {
        let dim = Dimension::new(name, len);
        match self.dimensions.iter_mut().find(|d| d.name == dim.name) {
            Some(existing) => existing.len = dim.len,
            None => self.dimensions.push(dim),
        }
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<NcValue>) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    /// Add a numeric variable over already-declared dimensions.
    ///
    /// Fails when a dimension is unknown or the array shape does not match
    /// the declared dimension lengths.
    pub fn with_variable(
        self,
        name: impl Into<String>,
        dimension_names: &[&str],
        data: impl Into<NumericArray>,
    ) -> NetCdfResult<Self> {
        self.with_variable_attrs(name, dimension_names, data, Vec::new())
    }

    pub fn with_variable_attrs(
        mut self,
        name: impl Into<String>,
        dimension_names: &[&str],
        data: impl Into<NumericArray>,
        attributes: Vec<Attribute>,
    ) -> NetCdfResult<Self> {
        let name = name.into();
        let data = data.into();

        let mut expected = Vec::with_capacity(dimension_names.len());
        for dim_name in dimension_names {
            let dim = self
                .dimensions
                .iter()
                .find(|d| d.name == *dim_name)
                .ok_or_else(|| NetCdfError::MissingData(format!("dimension {}", dim_name)))?;
            expected.push(dim.len);
        }
        if data.shape() != expected.as_slice() {
            return Err(NetCdfError::ShapeMismatch {
                variable: name,
                expected,
                actual: data.shape().iter().product(),
            });
        }

        let info = VariableInfo {
            name,
            dimension_names: dimension_names.iter().map(|d| d.to_string()).collect(),
            attributes,
        };
        let fill_value = info.fill_value();
        self.variables.push(Variable {
            info,
            data: NcValue::Array(data),
            fill_value,
        });
        Ok(self)
    }

    /// Add a variable whose data type has no numeric representation.
    pub fn with_unsupported_variable(
        mut self,
        name: impl Into<String>,
        dimension_names: &[&str],
        type_name: impl Into<String>,
    ) -> Self {
        self.variables.push(Variable {
            info: VariableInfo {
                name: name.into(),
                dimension_names: dimension_names.iter().map(|d| d.to_string()).collect(),
                attributes: Vec::new(),
            },
            data: NcValue::Unsupported(type_name.into()),
            fill_value: None,
        });
        self
    }
}

impl DatasetReader for MemoryDataset {
    fn dimensions(&self) -> NetCdfResult<Vec<Dimension>> {
        Ok(self.dimensions.clone())
    }

    fn global_attributes(&self) -> NetCdfResult<Vec<Attribute>> {
        Ok(self.attributes.clone())
    }

    fn variable_names(&self) -> NetCdfResult<Vec<String>> {
        Ok(self.variables.iter().map(|v| v.info.name.clone()).collect())
    }

    fn variable_info(&self, name: &str) -> NetCdfResult<Option<VariableInfo>> {
        Ok(self
            .variables
            .iter()
            .find(|v| v.info.name == name)
            .map(|v| v.info.clone()))
    }

    fn read_variable(&self, name: &str) -> NetCdfResult<Option<Variable>> {
        Ok(self.variables.iter().find(|v| v.info.name == name).cloned())
    }
}
