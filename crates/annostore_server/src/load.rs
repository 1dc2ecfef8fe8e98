//! Reading dataset documents.

use crate::error::{ServerError, ServerResult};
use annostore_model::{DatasetId, Document, LoadSource, DOCUMENT_PREFIX};
use annostore_storage::BlobStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Loads documents from the primary store, falling back to a read-only
/// store when the primary has nothing or fails.
pub struct DocumentLoader {
    primary: Arc<dyn BlobStore>,
    fallback: Option<Arc<dyn BlobStore>>,
}

impl DocumentLoader {
    /// Creates a loader over the primary store.
    pub fn new(primary: Arc<dyn BlobStore>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    /// Adds a read-only fallback store.
    pub fn with_fallback(mut self, fallback: Arc<dyn BlobStore>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Loads the document of a dataset.
    ///
    /// Returns `(None, LoadSource::Store)` when neither store has the
    /// dataset.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::CorruptDocument`] if the primary copy cannot be
    /// decoded, or [`ServerError::StorageUnavailable`] if the primary fails
    /// and the fallback has nothing to offer.
    pub async fn load(&self, dataset: &DatasetId) -> ServerResult<(Option<Document>, LoadSource)> {
        let path = dataset.object_path();

        match self.primary.get(&path).await {
            Ok(Some(blob)) => {
                let document =
                    Document::from_slice(&blob.data).map_err(ServerError::CorruptDocument)?;
                debug!(dataset = %dataset, generation = %blob.generation, "loaded from store");
                Ok((Some(document), LoadSource::Store))
            }
            Ok(None) => match self.load_fallback(&path).await {
                Some(document) => Ok((Some(document), LoadSource::Fallback)),
                None => Ok((None, LoadSource::Store)),
            },
            Err(e) => {
                warn!(dataset = %dataset, error = %e, "primary store read failed");
                match self.load_fallback(&path).await {
                    Some(document) => Ok((Some(document), LoadSource::Fallback)),
                    None => Err(e.into()),
                }
            }
        }
    }

    /// Lists the datasets that have a document in the primary store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub async fn list_datasets(&self) -> ServerResult<Vec<DatasetId>> {
        let paths = self.primary.list(DOCUMENT_PREFIX).await?;
        Ok(paths
            .iter()
            .filter_map(|path| DatasetId::from_object_path(path))
            .collect())
    }

    async fn load_fallback(&self, path: &str) -> Option<Document> {
        let fallback = self.fallback.as_ref()?;
        match fallback.get(path).await {
            Ok(Some(blob)) => match Document::from_slice(&blob.data) {
                Ok(document) => {
                    debug!(path, "loaded from fallback");
                    Some(document)
                }
                Err(e) => {
                    warn!(path, error = %e, "fallback document is corrupt");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(path, error = %e, "fallback store read failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annostore_storage::InMemoryBlobStore;

    fn dataset() -> DatasetId {
        DatasetId::new("north").unwrap()
    }

    async fn store_with(body: &[u8]) -> Arc<InMemoryBlobStore> {
        let store = Arc::new(InMemoryBlobStore::new());
        store.put(&dataset().object_path(), body).await.unwrap();
        store
    }

    #[tokio::test]
    async fn missing_everywhere_is_none() {
        let loader = DocumentLoader::new(Arc::new(InMemoryBlobStore::new()))
            .with_fallback(Arc::new(InMemoryBlobStore::new()));
        let (document, source) = loader.load(&dataset()).await.unwrap();
        assert!(document.is_none());
        assert_eq!(source, LoadSource::Store);
    }

    #[tokio::test]
    async fn primary_wins_over_fallback() {
        let primary = store_with(br#"[{"key":"a","S.No":1}]"#).await;
        let fallback = store_with(br#"[{"key":"old","S.No":1}]"#).await;
        let loader = DocumentLoader::new(primary).with_fallback(fallback);

        let (document, source) = loader.load(&dataset()).await.unwrap();
        assert_eq!(source, LoadSource::Store);
        assert!(document.unwrap().get("a").is_some());
    }

    #[tokio::test]
    async fn falls_back_when_primary_is_empty_or_down() {
        let primary = Arc::new(InMemoryBlobStore::new());
        let fallback = store_with(br#"[{"key":"old","S.No":1}]"#).await;
        let loader = DocumentLoader::new(Arc::clone(&primary) as Arc<dyn BlobStore>)
            .with_fallback(fallback);

        let (_, source) = loader.load(&dataset()).await.unwrap();
        assert_eq!(source, LoadSource::Fallback);

        primary.set_unavailable(Some("offline"));
        let (document, source) = loader.load(&dataset()).await.unwrap();
        assert_eq!(source, LoadSource::Fallback);
        assert_eq!(document.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn primary_failure_without_fallback_is_an_error() {
        let primary = Arc::new(InMemoryBlobStore::new());
        primary.set_unavailable(Some("offline"));
        let loader = DocumentLoader::new(primary);

        let result = loader.load(&dataset()).await;
        assert!(matches!(result, Err(ServerError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn corrupt_primary_is_reported() {
        let loader = DocumentLoader::new(store_with(b"not json").await);
        let result = loader.load(&dataset()).await;
        assert!(matches!(result, Err(ServerError::CorruptDocument(_))));
    }

    #[tokio::test]
    async fn lists_datasets_with_documents() {
        let store = store_with(b"[]").await;
        store.put("annotations/south.json", b"[]").await.unwrap();
        store.put("other/thing.json", b"[]").await.unwrap();
        let loader = DocumentLoader::new(store);

        let mut names: Vec<_> = loader
            .list_datasets()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["north", "south"]);
    }
}
