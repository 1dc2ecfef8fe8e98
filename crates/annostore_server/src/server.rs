//! Main annotation server.

use crate::commit::{SaveOutcome, SaveService, SaveStats};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, HttpResponse, RequestHandler};
use crate::load::DocumentLoader;
use annostore_model::{
    DatasetId, Document, LoadResponse, LoadSource, Record, SaveMode, SaveResponse,
};
use annostore_storage::BlobStore;
use std::sync::Arc;

/// The annotation server.
///
/// Serves `POST /save` and `GET /load` over a blob store. Saves are merged
/// into the stored document by key and committed with a conditional write,
/// so concurrent servers sharing one store never lose each other's records.
///
/// # Example
///
/// ```
/// use annostore_server::{AnnotationServer, ServerConfig};
/// use annostore_storage::InMemoryBlobStore;
/// use std::sync::Arc;
///
/// # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
/// # rt.block_on(async {
/// let server = AnnotationServer::new(ServerConfig::default(), Arc::new(InMemoryBlobStore::new()));
///
/// let response = server
///     .handle_request("POST", "/save?dataset=north", br#"{"data":[{"key":"a.jpg"}]}"#)
///     .await;
/// assert_eq!(response.status, 200);
/// # });
/// ```
pub struct AnnotationServer {
    context: HandlerContext,
}

impl AnnotationServer {
    /// Creates a new server over the given store.
    pub fn new(config: ServerConfig, store: Arc<dyn BlobStore>) -> Self {
        let saves = SaveService::new(Arc::clone(&store), &config);
        let loader = DocumentLoader::new(store);
        Self {
            context: HandlerContext::new(config, saves, loader),
        }
    }

    /// Adds a read-only store consulted by loads when the primary has
    /// nothing or fails.
    pub fn with_fallback(mut self, fallback: Arc<dyn BlobStore>) -> Self {
        self.context.loader = self.context.loader.with_fallback(fallback);
        self
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Dispatches a request by method and target (`path?query`).
    pub async fn handle_request(&self, method: &str, target: &str, body: &[u8]) -> HttpResponse {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let handler = RequestHandler::new(&self.context);

        match (method, path) {
            ("POST", "/save") => handler.handle_save(query, body).await,
            ("GET", "/load") => handler.handle_load(query).await,
            (_, "/load") => {
                let err = ServerError::MethodNotAllowed(format!("{method} {path}"));
                HttpResponse::json(err.status_code(), &LoadResponse::error(err.to_string()))
            }
            (_, "/save") => {
                let err = ServerError::MethodNotAllowed(format!("{method} {path}"));
                HttpResponse::json(err.status_code(), &SaveResponse::error(err.to_string()))
            }
            _ => {
                let err = ServerError::NotFound(path.to_string());
                HttpResponse::json(err.status_code(), &SaveResponse::error(err.to_string()))
            }
        }
    }

    /// Merges a partial batch into a dataset. Returns whether it committed.
    ///
    /// Datasets outside the configured allow-list are refused.
    pub async fn save(&self, records: Vec<Record>, dataset: &DatasetId) -> bool {
        self.try_save(records, dataset, SaveMode::Merge).await.is_ok()
    }

    /// Saves a batch in the given mode.
    ///
    /// # Errors
    ///
    /// See [`SaveService::try_save`].
    pub async fn try_save(
        &self,
        records: Vec<Record>,
        dataset: &DatasetId,
        mode: SaveMode,
    ) -> ServerResult<SaveOutcome> {
        if !self.context.config.accepts(dataset) {
            return Err(ServerError::UnknownDataset(dataset.clone()));
        }
        self.context.saves.try_save(records, dataset, mode).await
    }

    /// Loads a dataset's document.
    ///
    /// # Errors
    ///
    /// See [`DocumentLoader::load`].
    pub async fn load(&self, dataset: &DatasetId) -> ServerResult<(Option<Document>, LoadSource)> {
        self.context.loader.load(dataset).await
    }

    /// Lists datasets with a stored document.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub async fn list_datasets(&self) -> ServerResult<Vec<DatasetId>> {
        self.context.loader.list_datasets().await
    }

    /// Returns save counters.
    pub fn stats(&self) -> SaveStats {
        self.context.saves.stats()
    }
}
