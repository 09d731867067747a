//! Records read from the authoritative document store.
//!
//! A [`DocumentRecord`] keeps fields in stored order and carries typed values
//! the transport representation can only express as strings (UUIDs,
//! date-times). Conversion to JSON renders those the way the transport side
//! renders them, so the canonical stage sees the same tree either way.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use crate::error::ValidationError;

/// A typed document value.
#[derive(Debug, Clone, PartialEq)]
pub enum DocValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    /// Standard (RFC 4122 byte order) UUID
    Uuid(Uuid),
    /// Unix millis, UTC
    DateTime(i64),
    Array(Vec<DocValue>),
    Document(DocumentRecord),
}

impl From<&str> for DocValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for DocValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<bool> for DocValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for DocValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for DocValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for DocValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<Uuid> for DocValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for DocValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v.timestamp_millis())
    }
}

impl From<DocumentRecord> for DocValue {
    fn from(v: DocumentRecord) -> Self {
        Self::Document(v)
    }
}

impl<T: Into<DocValue>> From<Vec<T>> for DocValue {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

/// An ordered set of named, typed fields. The primary key is `_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentRecord {
    fields: Vec<(String, DocValue)>,
}

impl DocumentRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<DocValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field, replacing any previous value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<DocValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DocValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DocValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn to_json(&self) -> Result<Map<String, Value>, ValidationError> {
        let mut map = Map::new();
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.to_json(name)?);
        }
        Ok(map)
    }
}

/// The textual form shared with the transport representation.
pub(crate) fn render_millis(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl DocValue {
    fn to_json(&self, field: &str) -> Result<Value, ValidationError> {
        Ok(match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int32(n) => Value::from(*n),
            Self::Int64(n) => Value::from(*n),
            Self::Double(f) => Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| ValidationError::UnsupportedValue { field: field.to_string() })?,
            Self::String(s) => Value::String(s.clone()),
            Self::Uuid(u) => Value::String(u.hyphenated().to_string()),
            Self::DateTime(ms) => render_millis(*ms)
                .map(Value::String)
                .ok_or_else(|| ValidationError::UnsupportedValue { field: field.to_string() })?,
            Self::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| v.to_json(field))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Document(doc) => Value::Object(doc.to_json()?),
        })
    }
}
