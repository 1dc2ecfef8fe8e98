//! Documents: the ordered record collection of one dataset.

use crate::error::{ModelError, ModelResult};
use crate::merge::{coalesce_by_key, merge_by_key, renumber};
use crate::record::{validate_keys, Record};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// The full, ordered record collection of one dataset partition.
///
/// Stored as a single JSON array. Record keys are unique; order is
/// significant and is reflected in every record's position field.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Document {
    records: Vec<Record>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a document, validating keys are present and unique.
    ///
    /// # Errors
    ///
    /// Returns an error if a record lacks a key or two records share one.
    pub fn from_records(records: Vec<Record>) -> ModelResult<Self> {
        validate_keys(&records)?;
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if let Some(key) = record.key() {
                if !seen.insert(key) {
                    return Err(ModelError::DuplicateKey(key.to_string()));
                }
            }
        }
        Ok(Self { records })
    }

    /// Builds a document that replaces whatever was stored before.
    ///
    /// Duplicate keys collapse to their last occurrence and positions are
    /// recomputed.
    ///
    /// # Errors
    ///
    /// Returns an error if a record lacks a key.
    pub fn replacing(records: Vec<Record>) -> ModelResult<Self> {
        validate_keys(&records)?;
        let mut records = coalesce_by_key(records);
        renumber(&mut records);
        Ok(Self { records })
    }

    /// Decodes a stored document.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a JSON array of keyed objects
    /// with unique keys.
    pub fn from_slice(bytes: &[u8]) -> ModelResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Array(items) = value else {
            return Err(ModelError::NotAnArray);
        };
        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(map) => Ok(Record::from_map(map)),
                _ => Err(ModelError::NotAnObject { index }),
            })
            .collect::<ModelResult<Vec<_>>>()?;
        Self::from_records(records)
    }

    /// Encodes the document as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_vec(&self) -> ModelResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.records)?)
    }

    /// Merges a partial batch into this document by key.
    #[must_use]
    pub fn merge(self, incoming: Vec<Record>) -> Self {
        Self {
            records: merge_by_key(self.records, incoming),
        }
    }

    /// Returns the records in order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the document and returns its records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Returns the record with the given key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.key() == Some(key))
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the document has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
