//! Error types for blob store operations.

use crate::backend::Generation;
use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A conditional write found a different generation than expected.
    #[error("precondition failed: expected generation {expected}, found {actual}")]
    PreconditionFailed {
        /// The generation the caller expected.
        expected: Generation,
        /// The generation the store holds.
        actual: Generation,
    },

    /// A stored object could not be decoded.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The object path is not acceptable to the store.
    #[error("invalid object path: {0:?}")]
    InvalidPath(String),

    /// The store could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Returns true if this error is a generation mismatch.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, StorageError::PreconditionFailed { .. })
    }
}
