//! # annostore server
//!
//! Save and load endpoints for keyed annotation records kept as one JSON
//! document per dataset in a blob store.
//!
//! This crate provides:
//! - The merge-and-commit loop ([`SaveService`])
//! - Document loading with an optional read-only fallback ([`DocumentLoader`])
//! - Framework-agnostic request handling ([`AnnotationServer`])
//!
//! # Concurrency
//!
//! Several server instances may share one store. Each save reads the
//! current document and its generation, merges the incoming batch by key,
//! and writes back only if the generation has not moved. A writer that
//! loses the race re-reads and tries again, up to a bounded number of
//! attempts with exponential backoff:
//!
//! 1. Read the document and its generation (absent counts as generation 0)
//! 2. Merge the batch into it by record key
//! 3. Conditionally write the result against that generation
//! 4. On a generation mismatch, back off and go to 1
//!
//! A save that gives up never leaves a partial document behind.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod commit;
mod config;
mod error;
mod handler;
mod load;
mod server;

pub use commit::{CommitState, SaveOutcome, SaveService, SaveStats};
pub use config::{RetryConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use handler::{dataset_param, HandlerContext, HttpResponse, RequestHandler};
pub use load::DocumentLoader;
pub use server::AnnotationServer;
