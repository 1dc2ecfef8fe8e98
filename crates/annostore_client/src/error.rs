//! Error types for the save client.

use std::time::Duration;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can settle a pending save.
///
/// Clonable because one flush failure is delivered to every caller whose
/// record was in that batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Network or transport error while flushing a batch.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server answered with a failure.
    #[error("server rejected save ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The record cannot be saved (no key).
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The flush did not finish in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The coordinator was closed before the record was sent.
    #[error("save coordinator closed")]
    Closed,

    /// The response could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if re-enqueueing the record may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { retryable, .. } => *retryable,
            ClientError::Timeout(_) => true,
            ClientError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
