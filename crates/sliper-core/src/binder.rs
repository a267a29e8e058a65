//! Parameter binding between a loosely-typed attribute bag and the fixed
//! parameter schema a prediction method declares.
//!
//! Each method publishes a static `&[ParamSpec]`. `bind` resolves it against
//! the available attributes: declared names missing from the bag take their
//! default (recorded as defaulted) or `AttrValue::Null` (recorded as
//! unresolved); undeclared names are dropped.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::diagnostics::Diagnostics;
use crate::error::{Result, SliperError};
use crate::matrix::Matrix;

/// Attribute bag keyed by name. Ordered so diagnostics are reproducible.
pub type Attributes = BTreeMap<String, AttrValue>;

/// A single loosely-typed attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Vector(Vec<f64>),
    Matrix(Matrix),
}

impl AttrValue {
    /// Convert a JSON value. Arrays of numbers become vectors, arrays of
    /// equal-length numeric arrays become matrices. Objects and mixed arrays
    /// are rejected.
    pub fn from_json(name: &str, value: &Value) -> Result<Self> {
        let invalid = || SliperError::configuration(format!("attribute \"{name}\" has an unsupported JSON shape"));
        match value {
            Value::Null => Ok(AttrValue::Null),
            Value::Bool(b) => Ok(AttrValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(AttrValue::Int(i)),
                None => n.as_f64().map(AttrValue::Float).ok_or_else(invalid),
            },
            Value::String(s) => Ok(AttrValue::Text(s.clone())),
            Value::Array(items) if items.iter().all(Value::is_number) => items
                .iter()
                .map(|v| v.as_f64().ok_or_else(invalid))
                .collect::<Result<Vec<_>>>()
                .map(AttrValue::Vector),
            Value::Array(items) => {
                let mut rows = Vec::with_capacity(items.len());
                for item in items {
                    match AttrValue::from_json(name, item)? {
                        AttrValue::Vector(row) => rows.push(row),
                        _ => return Err(invalid()),
                    }
                }
                Ok(AttrValue::Matrix(Matrix::from_rows(&rows)?))
            }
            Value::Object(_) => Err(invalid()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    fn kind(&self) -> &'static str {
        match self {
            AttrValue::Null => "null",
            AttrValue::Bool(_) => "bool",
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Text(_) => "text",
            AttrValue::Vector(_) => "vector",
            AttrValue::Matrix(_) => "matrix",
        }
    }

    fn wrong_kind(&self, name: &str, expected: &str) -> SliperError {
        SliperError::invalid_model(format!(
            "attribute \"{name}\" must be a {expected}, found {}",
            self.kind()
        ))
    }

    pub fn as_matrix(&self, name: &str) -> Result<&Matrix> {
        match self {
            AttrValue::Matrix(m) => Ok(m),
            AttrValue::Null => Err(SliperError::missing_attribute(name)),
            other => Err(other.wrong_kind(name, "matrix")),
        }
    }

    /// Vector view. Single-row or single-column matrices are flattened, which
    /// is how `(1, M)` scale rows and `(K, 1)` coefficient columns arrive.
    pub fn to_vector(&self, name: &str) -> Result<Vec<f64>> {
        match self {
            AttrValue::Vector(v) => Ok(v.clone()),
            AttrValue::Matrix(m) if m.rows == 1 || m.cols == 1 => Ok(m.data.clone()),
            AttrValue::Null => Err(SliperError::missing_attribute(name)),
            other => Err(other.wrong_kind(name, "vector")),
        }
    }

    pub fn as_text(&self, name: &str) -> Result<&str> {
        match self {
            AttrValue::Text(s) => Ok(s),
            AttrValue::Null => Err(SliperError::missing_attribute(name)),
            other => Err(other.wrong_kind(name, "text")),
        }
    }

    pub fn as_int(&self, name: &str) -> Result<i64> {
        match self {
            AttrValue::Int(i) => Ok(*i),
            AttrValue::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
            AttrValue::Null => Err(SliperError::missing_attribute(name)),
            other => Err(other.wrong_kind(name, "integer")),
        }
    }

    pub fn as_float(&self, name: &str) -> Result<f64> {
        match self {
            AttrValue::Float(f) => Ok(*f),
            AttrValue::Int(i) => Ok(*i as f64),
            AttrValue::Null => Err(SliperError::missing_attribute(name)),
            other => Err(other.wrong_kind(name, "number")),
        }
    }
}

/// Default carried by a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    /// The parameter has a default and that default is null.
    Null,
    Int(i64),
    Float(f64),
    Text(&'static str),
}

impl ParamDefault {
    fn to_value(self) -> AttrValue {
        match self {
            ParamDefault::Null => AttrValue::Null,
            ParamDefault::Int(i) => AttrValue::Int(i),
            ParamDefault::Float(f) => AttrValue::Float(f),
            ParamDefault::Text(s) => AttrValue::Text(s.to_string()),
        }
    }
}

/// One entry of a method's declared parameter schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: Option<ParamDefault>,
}

impl ParamSpec {
    pub const fn required(name: &'static str) -> Self {
        Self { name, default: None }
    }

    pub const fn with_default(name: &'static str, default: ParamDefault) -> Self {
        Self {
            name,
            default: Some(default),
        }
    }
}

/// Argument set produced by [`bind`]. Its key set is exactly the declared
/// parameter names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundArgs {
    pub values: Attributes,
    pub defaulted: Vec<String>,
    pub unresolved: Vec<String>,
}

impl BoundArgs {
    /// Value bound to `name`; `Null` for names outside the schema.
    pub fn get(&self, name: &str) -> &AttrValue {
        const NULL: &AttrValue = &AttrValue::Null;
        self.values.get(name).unwrap_or(NULL)
    }
}

/// Resolve `declared` against `available`.
///
/// Emits at most two warnings: one listing every defaulted name, one listing
/// every unresolved name.
pub fn bind(declared: &[ParamSpec], mut available: Attributes, diag: &mut Diagnostics) -> BoundArgs {
    let mut bound = BoundArgs::default();

    for spec in declared {
        let value = match available.remove(spec.name) {
            Some(value) => value,
            None => match spec.default {
                Some(default) => {
                    bound.defaulted.push(spec.name.to_string());
                    default.to_value()
                }
                None => {
                    bound.unresolved.push(spec.name.to_string());
                    AttrValue::Null
                }
            },
        };
        bound.values.insert(spec.name.to_string(), value);
    }

    if !bound.defaulted.is_empty() {
        diag.warn(format!(
            "Parameters \"{}\" not defined; method will use a default value",
            bound.defaulted.join(",")
        ));
    }
    if !bound.unresolved.is_empty() {
        diag.warn(format!(
            "Parameters \"{}\" not defined; method will use a null value",
            bound.unresolved.join(",")
        ));
    }
    if !available.is_empty() {
        let dropped: Vec<&str> = available.keys().map(String::as_str).collect();
        diag.note(format!("Attributes \"{}\" not used by the method", dropped.join(",")));
    }

    bound
}
