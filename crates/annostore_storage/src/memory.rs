//! In-memory blob store for testing.

use crate::backend::{Blob, BlobStore, Generation};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// An in-memory blob store.
///
/// This store keeps all objects in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral servers that don't need persistence
///
/// It can also inject failures, so tests can reproduce a lost race or an
/// outage deterministically.
///
/// # Example
///
/// ```rust
/// use annostore_storage::{BlobStore, Generation, InMemoryBlobStore};
///
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// let store = InMemoryBlobStore::new();
/// let generation = store
///     .put_if_generation("a.json", b"[]", Generation::ABSENT)
///     .await
///     .unwrap();
/// let blob = store.get("a.json").await.unwrap().unwrap();
/// assert_eq!(blob.generation, generation);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    objects: RwLock<BTreeMap<String, Blob>>,
    last_generation: AtomicU64,
    forced_conflicts: AtomicUsize,
    unavailable: RwLock<Option<String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryBlobStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` conditional writes fail with a precondition
    /// error, as if another writer had committed first.
    pub fn inject_conflicts(&self, count: usize) {
        self.forced_conflicts.store(count, Ordering::SeqCst);
    }

    /// Makes every operation fail with [`StorageError::Unavailable`] until
    /// cleared with `None`.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        *self.unavailable.write() = reason.map(str::to_string);
    }

    /// Number of `get` calls served so far.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write attempts (conditional or not) so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns a copy of an object's contents, bypassing the counters.
    #[must_use]
    pub fn snapshot(&self, path: &str) -> Option<Blob> {
        self.objects.read().get(path).cloned()
    }

    fn check_available(&self) -> StorageResult<()> {
        match self.unavailable.read().as_ref() {
            Some(reason) => Err(StorageError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn next_generation(&self) -> Generation {
        Generation::new(self.last_generation.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, path: &str) -> StorageResult<Option<Blob>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.objects.read().get(path).cloned())
    }

    async fn put_if_generation(
        &self,
        path: &str,
        data: &[u8],
        expected: Generation,
    ) -> StorageResult<Generation> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut objects = self.objects.write();
        let actual = objects
            .get(path)
            .map(|blob| blob.generation)
            .unwrap_or(Generation::ABSENT);

        let forced = self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Err(StorageError::PreconditionFailed {
                expected,
                actual: Generation::new(actual.get() + 1),
            });
        }

        if actual != expected {
            return Err(StorageError::PreconditionFailed { expected, actual });
        }

        let generation = self.next_generation();
        objects.insert(path.to_string(), Blob::new(data.to_vec(), generation));
        Ok(generation)
    }

    async fn put(&self, path: &str, data: &[u8]) -> StorageResult<Generation> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut objects = self.objects.write();
        let generation = self.next_generation();
        objects.insert(path.to_string(), Blob::new(data.to_vec(), generation));
        Ok(generation)
    }

    async fn delete(&self, path: &str) -> StorageResult<bool> {
        self.check_available()?;
        Ok(self.objects.write().remove(path).is_some())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.check_available()?;
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_new_is_empty() {
        let store = InMemoryBlobStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(store.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_requires_absent() {
        let store = InMemoryBlobStore::new();
        let first = store
            .put_if_generation("doc", b"one", Generation::ABSENT)
            .await
            .unwrap();
        assert_eq!(first, Generation::new(1));

        let result = store
            .put_if_generation("doc", b"two", Generation::ABSENT)
            .await;
        assert!(matches!(
            result,
            Err(StorageError::PreconditionFailed { actual, .. }) if actual == first
        ));
        assert_eq!(store.snapshot("doc").unwrap().data, b"one");
    }

    #[tokio::test]
    async fn conditional_write_advances_generation() {
        let store = InMemoryBlobStore::new();
        let g1 = store.put("doc", b"one").await.unwrap();
        let g2 = store.put_if_generation("doc", b"two", g1).await.unwrap();
        assert!(g2 > g1);

        let stale = store.put_if_generation("doc", b"three", g1).await;
        assert!(stale.unwrap_err().is_precondition_failed());

        let blob = store.get("doc").await.unwrap().unwrap();
        assert_eq!(blob.data, b"two");
        assert_eq!(blob.generation, g2);
    }

    #[tokio::test]
    async fn generations_survive_delete() {
        let store = InMemoryBlobStore::new();
        let g1 = store.put("doc", b"one").await.unwrap();
        assert!(store.delete("doc").await.unwrap());
        assert!(!store.delete("doc").await.unwrap());
        let g2 = store
            .put_if_generation("doc", b"again", Generation::ABSENT)
            .await
            .unwrap();
        assert!(g2 > g1);
    }

    #[tokio::test]
    async fn injected_conflicts_are_consumed() {
        let store = InMemoryBlobStore::new();
        store.inject_conflicts(1);

        let first = store
            .put_if_generation("doc", b"x", Generation::ABSENT)
            .await;
        assert!(first.unwrap_err().is_precondition_failed());
        assert!(store.snapshot("doc").is_none());

        store
            .put_if_generation("doc", b"x", Generation::ABSENT)
            .await
            .unwrap();
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn unavailable_store_fails_everything() {
        let store = InMemoryBlobStore::new();
        store.set_unavailable(Some("maintenance"));
        assert!(matches!(
            store.get("doc").await,
            Err(StorageError::Unavailable(_))
        ));
        assert!(store.put("doc", b"x").await.is_err());

        store.set_unavailable(None);
        assert!(store.put("doc", b"x").await.is_ok());
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let store = InMemoryBlobStore::new();
        store.put("annotations/b.json", b"[]").await.unwrap();
        store.put("annotations/a.json", b"[]").await.unwrap();
        store.put("other/c.json", b"[]").await.unwrap();

        let listed = store.list("annotations/").await.unwrap();
        assert_eq!(listed, vec!["annotations/a.json", "annotations/b.json"]);
    }
}
