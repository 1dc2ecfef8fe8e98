//! # annostore client
//!
//! Client side of the annotation save protocol.
//!
//! This crate provides:
//! - A save coordinator that debounces, coalesces and batches record saves
//! - Single-flight flushing per dataset
//! - HTTP transport abstraction with an in-process loopback
//! - A mock transport for tests
//!
//! ## Architecture
//!
//! UI actions call [`SaveCoordinator::enqueue`] once per edited record and
//! get a [`PendingSave`] back. Records wait in a per-dataset queue until the
//! debounce delay passes or the queue fills up, then go out as one merge
//! request. The server merges the batch into the stored document by key and
//! resolves generation conflicts itself, so the client never retries.
//!
//! ## Key Invariants
//!
//! - At most one flush per dataset is in flight
//! - Every enqueued record's handle settles exactly once
//! - A failed flush rejects every handle in its batch
//! - Within a flush the most recently enqueued record for a key wins

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod error;
mod http;
mod transport;

pub use config::CoordinatorConfig;
pub use coordinator::{CoordinatorStats, PendingSave, SaveCoordinator};
pub use error::{ClientError, ClientResult};
pub use http::{HttpClient, HttpReply, HttpTransport, LoopbackClient, LoopbackServer};
pub use transport::{MockTransport, SaveCall, SaveTransport};
