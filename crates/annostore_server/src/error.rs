//! Error types for the annotation server.

use annostore_model::{DatasetId, ModelError};
use annostore_storage::StorageError;
use std::time::Duration;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while saving or loading a dataset.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Empty or malformed record batch. Rejected before any store access.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The dataset is not served by this server.
    #[error("unknown dataset: {0}")]
    UnknownDataset(DatasetId),

    /// Every commit attempt lost the generation race.
    #[error("concurrent modification: gave up after {attempts} attempts")]
    ConcurrentModification {
        /// Number of attempts made.
        attempts: u32,
    },

    /// The blob store failed for a reason other than a generation mismatch.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    /// The stored document could not be decoded or encoded.
    #[error("corrupt document: {0}")]
    CorruptDocument(#[source] ModelError),

    /// The save did not finish in time.
    #[error("save timed out after {0:?}")]
    Timeout(Duration),

    /// No route matches the request path.
    #[error("not found: {0}")]
    NotFound(String),

    /// The route exists but not for this method.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
}

impl ServerError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidInput(_) | ServerError::UnknownDataset(_) => 400,
            ServerError::NotFound(_) => 404,
            ServerError::MethodNotAllowed(_) => 405,
            ServerError::StorageUnavailable(_) | ServerError::CorruptDocument(_) => 500,
            ServerError::ConcurrentModification { .. } => 503,
            ServerError::Timeout(_) => 504,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<ModelError> for ServerError {
    fn from(err: ModelError) -> Self {
        ServerError::InvalidInput(err.to_string())
    }
}
