//! # annostore Storage
//!
//! Generation-versioned blob store trait and implementations for annostore.
//!
//! This crate provides the lowest-level storage abstraction. Stores are
//! **opaque byte stores** keyed by object path - they do not interpret the
//! documents they hold.
//!
//! ## Design Principles
//!
//! - Every write assigns a new, strictly larger [`Generation`]
//! - Conditional writes are the only mutual-exclusion primitive
//! - Whole-object writes are atomic; there are no partial updates
//! - Stores must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryBlobStore`] - For testing and ephemeral servers
//! - [`FileBlobStore`] - For persistent storage in a local directory
//!
//! ## Example
//!
//! ```rust
//! use annostore_storage::{BlobStore, Generation, InMemoryBlobStore};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let store = InMemoryBlobStore::new();
//! let first = store.put_if_generation("doc.json", b"[]", Generation::ABSENT).await.unwrap();
//!
//! // A writer holding a stale generation is rejected.
//! store.put_if_generation("doc.json", b"[1]", first).await.unwrap();
//! assert!(store.put_if_generation("doc.json", b"[2]", first).await.is_err());
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{Blob, BlobStore, Generation};
pub use error::{StorageError, StorageResult};
pub use file::FileBlobStore;
pub use memory::InMemoryBlobStore;
