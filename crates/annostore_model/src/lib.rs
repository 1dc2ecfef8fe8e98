//! # annostore Model
//!
//! Records, documents, the key-based merge and the wire messages shared by
//! the annostore server and client.
//!
//! This crate provides:
//! - [`Record`] and [`DatasetId`]
//! - [`Document`] encoding/decoding as a JSON array
//! - [`merge_by_key`], the single merge algorithm used everywhere
//! - Save/load request and response bodies
//!
//! This is a pure data crate with no I/O operations.
//!
//! ## Merge Invariants
//!
//! - Every key from the existing document and the incoming batch appears
//!   exactly once in the result
//! - Updated records keep the position of the record they replace
//! - New records are appended in their incoming order
//! - [`POSITION_FIELD`] is derived output, never identity

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod merge;
mod messages;
mod record;

pub use document::Document;
pub use error::{ModelError, ModelResult};
pub use merge::{coalesce_by_key, merge_by_key, renumber};
pub use messages::{LoadResponse, LoadSource, SaveMode, SaveRequest, SaveResponse};
pub use record::{validate_keys, DatasetId, Record, DOCUMENT_PREFIX, KEY_FIELD, POSITION_FIELD};
