//! Blob store trait definition.

use crate::error::StorageResult;
use async_trait::async_trait;
use std::fmt;

/// Store-assigned version stamp of a persisted object.
///
/// Generations are strictly increasing across the whole store, so an
/// object that is deleted and re-created never reuses an old generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// Precondition meaning "the object must not exist yet".
    pub const ABSENT: Generation = Generation(0);

    /// Creates a generation from its raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns true if this is [`Generation::ABSENT`].
    #[must_use]
    pub const fn is_absent(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An object read from the store together with its generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Object contents.
    pub data: Vec<u8>,
    /// Generation of this version of the object.
    pub generation: Generation,
}

impl Blob {
    /// Creates a blob.
    #[must_use]
    pub fn new(data: Vec<u8>, generation: Generation) -> Self {
        Self { data, generation }
    }
}

/// A generation-versioned object store.
///
/// Stores are **opaque byte stores** keyed by object path. Every successful
/// write assigns a new, larger generation. Writes replace the whole object
/// atomically: a reader sees either the old or the new contents, never a mix.
///
/// # Invariants
///
/// - `put_if_generation` succeeds only if the current generation equals
///   `expected` at commit time ([`Generation::ABSENT`] matches a missing
///   object)
/// - a mismatch returns [`crate::StorageError::PreconditionFailed`] and
///   leaves the object untouched
/// - implementations must be `Send + Sync` so one store can serve many
///   concurrent requests
///
/// # Implementors
///
/// - [`super::InMemoryBlobStore`] - For testing
/// - [`super::FileBlobStore`] - For persistent storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Reads an object and its generation, or `None` if it does not exist.
    async fn get(&self, path: &str) -> StorageResult<Option<Blob>>;

    /// Writes an object only if its current generation equals `expected`.
    ///
    /// Returns the new generation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::PreconditionFailed`] on a generation
    /// mismatch, or another error if the write could not be performed.
    async fn put_if_generation(
        &self,
        path: &str,
        data: &[u8],
        expected: Generation,
    ) -> StorageResult<Generation>;

    /// Writes an object unconditionally and returns the new generation.
    async fn put(&self, path: &str, data: &[u8]) -> StorageResult<Generation>;

    /// Deletes an object. Returns false if it did not exist.
    async fn delete(&self, path: &str) -> StorageResult<bool>;

    /// Lists object paths that start with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_ordering() {
        assert!(Generation::ABSENT < Generation::new(1));
        assert!(Generation::ABSENT.is_absent());
        assert!(!Generation::new(5).is_absent());
        assert_eq!(Generation::new(42).get(), 42);
        assert_eq!(Generation::new(42).to_string(), "42");
    }
}
