use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub mod document;
pub mod query;
pub mod streaming;

// Re-export document types
pub use document::{Document, DocumentRef, Record, ID_FIELD};

// Re-export query expression types
pub use query::{Direction, FieldFilter, FilterOp, OrderBy, PageAnchor, Query, QueryClause};

// Re-export streaming types
pub use streaming::{
    DocumentStore, EventStream, ListenTarget, Listener, ListenerRegistration, StoreSnapshot,
    Unsubscribe,
};

/// Dynamic field value of a stored document.
///
/// Snapshot records may carry any field with any shape, so every field value is
/// one variant of this tagged union. The `Reference` variant is the pointer type
/// the reference resolver pattern-matches on.
///
/// Serialization is untagged. A reference serializes as `{"$ref": "users/u1"}`
/// and an object holding exactly that key deserializes back into `Reference`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    // Stored as RFC3339 string; use as_datetime() for the parsed chrono value
    DateTime(String),
    Reference(DocumentRef),
    Array(Vec<Value>),
    Object(Record),
    Null,
}

impl Value {
    /// Create a Value from a serde_json::Value
    pub fn from_json_value(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    n.as_f64().map(Value::Float).unwrap_or(Value::Null)
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from_json_value).collect())
            }
            serde_json::Value::Object(obj) => {
                if obj.len() == 1 {
                    if let Some(serde_json::Value::String(path)) = obj.get(document::REF_KEY) {
                        return Value::Reference(DocumentRef::from_path(path.clone()));
                    }
                }
                Value::Object(
                    obj.into_iter()
                        .map(|(k, v)| (k, Value::from_json_value(v)))
                        .collect(),
                )
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get datetime value as parsed chrono::DateTime
    pub fn as_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self {
            Value::DateTime(s) => chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&chrono::Utc)),
            _ => None,
        }
    }

    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Value::DateTime(dt.to_rfc3339())
    }

    pub fn as_reference(&self) -> Option<&DocumentRef> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Reference(_))
    }

    /// Order two values of the same kind.
    ///
    /// Integers and floats compare numerically with each other. Values of
    /// different kinds are unordered and yield `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (a, b) if a.is_number() && b.is_number() => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => {
                match (self.as_datetime(), other.as_datetime()) {
                    (Some(x), Some(y)) => Some(x.cmp(&y)),
                    _ => Some(a.cmp(b)),
                }
            }
            (Value::Reference(a), Value::Reference(b)) => Some(a.path().cmp(b.path())),
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// Equality as a query filter sees it: numeric kinds compare by value,
    /// composite values structurally.
    pub fn matches(&self, other: &Value) -> bool {
        match self.compare(other) {
            Some(ordering) => ordering == Ordering::Equal,
            None => self == other,
        }
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<u32> for Value {
    fn from(u: u32) -> Self {
        Value::Integer(u as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<DocumentRef> for Value {
    fn from(r: DocumentRef) -> Self {
        Value::Reference(r)
    }
}

impl<T> From<Vec<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<Record> for Value {
    fn from(map: Record) -> Self {
        Value::Object(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json_value(v)
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => serde_json::Value::String(s),
            Value::Integer(i) => serde_json::Value::Number(serde_json::Number::from(i)),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(b),
            Value::DateTime(s) => serde_json::Value::String(s),
            Value::Reference(r) => {
                let mut obj = serde_json::Map::new();
                obj.insert(
                    document::REF_KEY.to_string(),
                    serde_json::Value::String(r.path().to_string()),
                );
                serde_json::Value::Object(obj)
            }
            Value::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(Into::into).collect())
            }
            Value::Object(obj) => {
                serde_json::Value::Object(obj.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            Value::Null => serde_json::Value::Null,
        }
    }
}

/// Build a [`Record`] from `(field, value)` pairs.
pub fn record<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect::<BTreeMap<_, _>>()
}

/// Errors reported by a document store, either on a listener's event stream
/// or from a point read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum StoreError {
    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Invalid document path: {path}")]
    InvalidPath { path: String },

    #[error("Document not found: {path}")]
    NotFound { path: String },

    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Read of {path} failed: {message}")]
    ReadFailed { path: String, message: String },

    #[error("Read of {path} timed out")]
    Timeout { path: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        let v = Value::Boolean(true);
        assert_eq!(v.as_bool(), Some(true));
        assert_eq!(v.as_i64(), None);

        let v = Value::Integer(42);
        assert_eq!(v.as_i64(), Some(42));
        assert_eq!(v.as_f64(), Some(42.0));

        let v = Value::String("hello".to_string());
        assert_eq!(v.as_str(), Some("hello"));

        let v = Value::Reference(DocumentRef::new("users", "u1"));
        assert_eq!(v.as_reference().map(|r| r.id()), Some("u1"));

        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_reference_serializes_as_ref_object() {
        let v = Value::Reference(DocumentRef::new("users", "u1"));
        assert_eq!(v.to_json_string(), r#"{"$ref":"users/u1"}"#);

        let parsed = Value::from_json_str(r#"{"$ref":"users/u1"}"#).unwrap();
        assert_eq!(parsed, v);

        // An object that merely contains a "$ref" key among others stays an object
        let parsed = Value::from_json_str(r#"{"$ref":"users/u1","name":"x"}"#).unwrap();
        assert!(parsed.as_object().is_some());
    }

    #[test]
    fn test_from_json_value_detects_references() {
        let json = serde_json::json!({
            "title": "Fix sink",
            "budget": 120,
            "requester": {"$ref": "users/u1"},
            "tags": ["plumbing"]
        });
        let v = Value::from(json);
        let obj = v.as_object().unwrap();
        assert!(obj["requester"].is_reference());
        assert_eq!(obj["budget"], Value::Integer(120));
        assert_eq!(obj["tags"], Value::Array(vec![Value::from("plumbing")]));
    }

    #[test]
    fn test_compare_numbers_across_kinds() {
        assert_eq!(
            Value::Integer(3).compare(&Value::Float(2.5)),
            Some(Ordering::Greater)
        );
        assert!(Value::Integer(1).matches(&Value::Float(1.0)));
        assert_eq!(Value::from("a").compare(&Value::Integer(1)), None);
        assert!(!Value::from("a").matches(&Value::Integer(1)));
    }

    #[test]
    fn test_compare_datetimes() {
        let early = Value::DateTime("2024-01-01T00:00:00Z".to_string());
        let late = Value::DateTime("2024-06-01T12:00:00+02:00".to_string());
        assert_eq!(early.compare(&late), Some(Ordering::Less));
    }

    #[test]
    fn test_record_helper() {
        let r = record([("name", Value::from("Ana")), ("age", Value::from(30))]);
        assert_eq!(r.len(), 2);
        assert_eq!(r["age"], Value::Integer(30));
    }
}
