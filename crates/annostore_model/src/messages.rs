//! Request and response bodies of the save/load endpoints.

use crate::record::Record;
use serde::{Deserialize, Serialize};

/// How a save batch is applied to the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Upsert the batch into the current document by key.
    Merge,
    /// Replace the whole document with the batch.
    Replace,
}

/// Body of `POST /save`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    /// Whether `data` is a partial batch to merge (the default) or the full
    /// document.
    #[serde(default = "default_partial")]
    pub is_partial_update: bool,
    /// Records to save.
    pub data: Vec<Record>,
}

fn default_partial() -> bool {
    true
}

impl SaveRequest {
    /// Creates a partial-update request.
    pub fn merge(data: Vec<Record>) -> Self {
        Self {
            is_partial_update: true,
            data,
        }
    }

    /// Creates a request for the given mode.
    pub fn with_mode(data: Vec<Record>, mode: SaveMode) -> Self {
        Self {
            is_partial_update: mode == SaveMode::Merge,
            data,
        }
    }

    /// Returns the save mode.
    pub fn mode(&self) -> SaveMode {
        if self.is_partial_update {
            SaveMode::Merge
        } else {
            SaveMode::Replace
        }
    }
}

/// Body returned by `POST /save`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    /// Whether the batch was committed.
    pub success: bool,
    /// Whether the batch was merged (as opposed to replacing the document).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged: Option<bool>,
    /// Number of distinct records written by the batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_updated: Option<usize>,
    /// Error message (if failed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveResponse {
    /// Creates a success response.
    pub fn success(merged: bool, images_updated: usize) -> Self {
        Self {
            success: true,
            merged: Some(merged),
            images_updated: Some(images_updated),
            error: None,
        }
    }

    /// Creates a failure response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            merged: None,
            images_updated: None,
            error: Some(message.into()),
        }
    }
}

/// Where a loaded document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
    /// The primary blob store.
    Store,
    /// The read-only fallback store.
    Fallback,
}

/// Body returned by `GET /load`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResponse {
    /// Whether the load succeeded.
    pub success: bool,
    /// The document records, or `null` if the dataset has none yet.
    #[serde(default)]
    pub data: Option<Vec<Record>>,
    /// Where the records came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<LoadSource>,
    /// Error message (if failed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoadResponse {
    /// Creates a success response.
    pub fn success(data: Option<Vec<Record>>, source: LoadSource) -> Self {
        Self {
            success: true,
            data,
            source: Some(source),
            error: None,
        }
    }

    /// Creates a failure response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            source: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn save_request_wire_names() {
        let req: SaveRequest = serde_json::from_value(json!({
            "isPartialUpdate": false,
            "data": [{"key": "a.jpg"}]
        }))
        .unwrap();
        assert_eq!(req.mode(), SaveMode::Replace);
        assert_eq!(req.data.len(), 1);
    }

    #[test]
    fn save_request_defaults_to_merge() {
        let req: SaveRequest = serde_json::from_value(json!({"data": []})).unwrap();
        assert_eq!(req.mode(), SaveMode::Merge);
    }

    #[test]
    fn save_request_rejects_non_object_records() {
        let req: Result<SaveRequest, _> = serde_json::from_value(json!({"data": [1, 2]}));
        assert!(req.is_err());
    }

    #[test]
    fn save_response_shapes() {
        let ok = serde_json::to_value(SaveResponse::success(true, 3)).unwrap();
        assert_eq!(
            ok,
            json!({"success": true, "merged": true, "imagesUpdated": 3})
        );

        let err = serde_json::to_value(SaveResponse::error("boom")).unwrap();
        assert_eq!(err, json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn load_response_shapes() {
        let empty = serde_json::to_value(LoadResponse::success(None, LoadSource::Store)).unwrap();
        assert_eq!(
            empty,
            json!({"success": true, "data": null, "source": "store"})
        );

        let fallback = LoadResponse::success(Some(vec![Record::with_key("a")]), LoadSource::Fallback);
        let value = serde_json::to_value(&fallback).unwrap();
        assert_eq!(value["source"], json!("fallback"));
        let back: LoadResponse = serde_json::from_value(value).unwrap();
        assert_eq!(back, fallback);
    }
}
