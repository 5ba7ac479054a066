//! Documents and the rows they are built from

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashMap};

/// A single field value of a source row or document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(DateTime<Utc>),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Null and non-finite numbers count as missing
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Float(f) => !f.is_finite(),
            _ => false,
        }
    }

    /// JSON form sent to the engine
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::Number((*i).into()),
            FieldValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Date(d) => Value::String(d.to_rfc3339()),
            FieldValue::List(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Text(value.format("%Y-%m-%d").to_string())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(value: Vec<T>) -> Self {
        FieldValue::List(value.into_iter().map(Into::into).collect())
    }
}

/// Nested objects are kept as their JSON text
impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n.as_f64().map_or(FieldValue::Null, FieldValue::Float),
            },
            Value::String(s) => FieldValue::Text(s),
            Value::Array(items) => FieldValue::List(items.into_iter().map(Into::into).collect()),
            object @ Value::Object(_) => FieldValue::Text(object.to_string()),
        }
    }
}

/// Field name to value
pub type Fields = BTreeMap<String, FieldValue>;

/// A document ready to be written to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_type: String,
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(doc_type: impl Into<String>, id: impl Into<String>, fields: Fields) -> Self {
        Self {
            doc_type: doc_type.into(),
            id: id.into(),
            fields,
        }
    }

    /// The `_source` body
    pub fn source(&self) -> Value {
        fields_to_json(&self.fields)
    }
}

pub(crate) fn fields_to_json(fields: &Fields) -> Value {
    let object: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect();
    Value::Object(object)
}

/// A record of the source data set with per-field access
pub trait SourceRow {
    /// Value of a field, `None` if the row has no such field
    fn value(&self, name: &str) -> Option<FieldValue>;

    /// Whether the field is absent, null or not a number
    fn is_missing(&self, name: &str) -> bool {
        self.value(name).map_or(true, |v| v.is_missing())
    }
}

impl SourceRow for BTreeMap<String, FieldValue> {
    fn value(&self, name: &str) -> Option<FieldValue> {
        self.get(name).cloned()
    }
}

impl SourceRow for HashMap<String, FieldValue> {
    fn value(&self, name: &str) -> Option<FieldValue> {
        self.get(name).cloned()
    }
}

impl SourceRow for Map<String, Value> {
    fn value(&self, name: &str) -> Option<FieldValue> {
        self.get(name).cloned().map(FieldValue::from)
    }
}

impl<R: SourceRow + ?Sized> SourceRow for &R {
    fn value(&self, name: &str) -> Option<FieldValue> {
        (**self).value(name)
    }
}
