//! Records and dataset identifiers.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Field holding a record's natural key.
pub const KEY_FIELD: &str = "key";

/// Display-only field holding a record's 1-based position in its document.
///
/// Recomputed on every merge. Never used to match records.
pub const POSITION_FIELD: &str = "S.No";

/// Prefix of the object path every dataset document lives under.
pub const DOCUMENT_PREFIX: &str = "annotations/";

const MAX_DATASET_LEN: usize = 64;

/// One keyed entity inside a document, e.g. the annotation state of a
/// single image.
///
/// A record is an arbitrary JSON object. Its identity is the string in
/// [`KEY_FIELD`]; every other field is opaque payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record with only its key set.
    #[must_use]
    pub fn with_key(key: impl Into<String>) -> Self {
        let key: String = key.into();
        Self::new().with(KEY_FIELD, key)
    }

    /// Wraps an existing JSON object.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Returns the record key, if present and a non-empty string.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self.0.get(KEY_FIELD) {
            Some(Value::String(key)) if !key.is_empty() => Some(key.as_str()),
            _ => None,
        }
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns the recomputed position, if one has been assigned.
    #[must_use]
    pub fn position(&self) -> Option<u64> {
        self.0.get(POSITION_FIELD).and_then(Value::as_u64)
    }

    pub(crate) fn set_position(&mut self, position: usize) {
        self.0
            .insert(POSITION_FIELD.to_string(), Value::from(position as u64));
    }

    /// Returns the underlying JSON object.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the record and returns the underlying JSON object.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl TryFrom<Value> for Record {
    type Error = ModelError;

    fn try_from(value: Value) -> ModelResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ModelError::NotARecord),
        }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

/// Checks that every record in a batch carries a key.
///
/// # Errors
///
/// Returns [`ModelError::MissingKey`] for the first keyless record.
pub fn validate_keys(records: &[Record]) -> ModelResult<()> {
    match records.iter().position(|r| r.key().is_none()) {
        Some(index) => Err(ModelError::MissingKey { index }),
        None => Ok(()),
    }
}

/// Name of an independently versioned dataset partition.
///
/// Identifiers are 1 to 64 characters of ASCII letters, digits, `-` and
/// `_`, so they can be embedded in object paths and query strings as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetId(String);

impl DatasetId {
    /// Validates and wraps a dataset name.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidDataset`] if the name is not acceptable.
    pub fn new(name: impl Into<String>) -> ModelResult<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.len() <= MAX_DATASET_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(name))
        } else {
            Err(ModelError::InvalidDataset(name))
        }
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the blob-store path of this dataset's document.
    #[must_use]
    pub fn object_path(&self) -> String {
        format!("{DOCUMENT_PREFIX}{}.json", self.0)
    }

    /// Recovers a dataset id from a document object path.
    #[must_use]
    pub fn from_object_path(path: &str) -> Option<Self> {
        path.strip_prefix(DOCUMENT_PREFIX)
            .and_then(|rest| rest.strip_suffix(".json"))
            .and_then(|name| Self::new(name).ok())
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DatasetId {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for DatasetId {
    type Error = ModelError;

    fn try_from(value: String) -> ModelResult<Self> {
        Self::new(value)
    }
}

impl From<DatasetId> for String {
    fn from(id: DatasetId) -> Self {
        id.0
    }
}
