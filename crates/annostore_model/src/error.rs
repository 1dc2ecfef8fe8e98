//! Error types for records, documents and messages.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while validating or decoding records and documents.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Dataset identifier is empty, too long or has forbidden characters.
    #[error("invalid dataset id: {0:?}")]
    InvalidDataset(String),

    /// A record has no usable key.
    #[error("record {index} has no non-empty string \"key\" field")]
    MissingKey {
        /// Position of the record in its batch.
        index: usize,
    },

    /// Two records in one document share a key.
    #[error("duplicate record key: {0:?}")]
    DuplicateKey(String),

    /// Top-level JSON value is not an array.
    #[error("expected a JSON array of records")]
    NotAnArray,

    /// An array element is not a JSON object.
    #[error("element {index} is not a JSON object")]
    NotAnObject {
        /// Position of the element.
        index: usize,
    },

    /// A standalone JSON value is not an object.
    #[error("record must be a JSON object")]
    NotARecord,

    /// Malformed JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ModelError::MissingKey { index: 3 };
        assert!(err.to_string().contains('3'));

        let err = ModelError::DuplicateKey("img_001.jpg".into());
        assert!(err.to_string().contains("img_001.jpg"));

        let err = ModelError::NotARecord;
        assert!(!err.to_string().contains('0'));
    }
}
