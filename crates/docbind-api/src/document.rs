use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{StoreError, Value};

/// Field name → value mapping of one document.
///
/// Ordered so that serialization (and therefore subscription identity) is
/// deterministic.
pub type Record = BTreeMap<String, Value>;

/// Name of the synthetic field carrying the store-assigned document id.
pub const ID_FIELD: &str = "id";

/// Key under which a reference is serialized.
pub(crate) const REF_KEY: &str = "$ref";

/// Typed pointer to another document, by full path (`collection/id`,
/// or `a/x/b/y` for nested collections).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentRef {
    #[serde(rename = "$ref")]
    path: String,
}

impl DocumentRef {
    pub fn new(collection: &str, id: &str) -> Self {
        Self {
            path: format!("{}/{}", collection.trim_end_matches('/'), id),
        }
    }

    /// Parse a full document path, rejecting collection paths and empty segments.
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 2 || segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty())
        {
            return Err(StoreError::InvalidPath {
                path: path.to_string(),
            });
        }
        Ok(Self::from_path(path.to_string()))
    }

    pub(crate) fn from_path(path: String) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The document id (last path segment).
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Path of the collection containing this document.
    pub fn collection(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..idx],
            None => "",
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// A raw document as held by the store: its location plus its stored fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub reference: DocumentRef,
    pub data: Record,
}

impl Document {
    pub fn new(reference: DocumentRef, data: Record) -> Self {
        Self { reference, data }
    }

    pub fn id(&self) -> &str {
        self.reference.id()
    }

    /// The record delivered to consumers: the synthetic `id` merged with the
    /// stored fields. A stored field named `id` wins over the synthetic one.
    pub fn into_record(self) -> Record {
        let mut record = Record::new();
        record.insert(
            ID_FIELD.to_string(),
            Value::String(self.reference.id().to_string()),
        );
        record.extend(self.data);
        record
    }
}
