//! Request handlers for the save and load endpoints.

use crate::commit::SaveService;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::load::DocumentLoader;
use annostore_model::{DatasetId, LoadResponse, SaveRequest, SaveResponse};
use serde::Serialize;
use tracing::debug;

/// A status code and JSON body, independent of any HTTP framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Serializes `body` as JSON with the given status.
    pub fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(body) => Self { status, body },
            Err(e) => Self {
                status: 500,
                body: format!(r#"{{"success":false,"error":"{e}"}}"#).into_bytes(),
            },
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Merge-and-commit service.
    pub saves: SaveService,
    /// Document reader.
    pub loader: DocumentLoader,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, saves: SaveService, loader: DocumentLoader) -> Self {
        Self {
            config,
            saves,
            loader,
        }
    }

    /// Resolves and checks the dataset named in a query string.
    pub fn dataset(&self, query: &str) -> ServerResult<DatasetId> {
        let name = dataset_param(query)
            .ok_or_else(|| ServerError::InvalidInput("missing dataset parameter".into()))?;
        let dataset = DatasetId::new(name)?;
        if !self.config.accepts(&dataset) {
            return Err(ServerError::UnknownDataset(dataset));
        }
        Ok(dataset)
    }
}

/// Extracts the `dataset` parameter from a query string.
pub fn dataset_param(query: &str) -> Option<&str> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == "dataset")
        .map(|(_, value)| value)
}

/// Handler for save and load requests.
pub struct RequestHandler<'a> {
    context: &'a HandlerContext,
}

impl<'a> RequestHandler<'a> {
    /// Creates a new request handler.
    pub fn new(context: &'a HandlerContext) -> Self {
        Self { context }
    }

    /// Handles `POST /save`.
    pub async fn handle_save(&self, query: &str, body: &[u8]) -> HttpResponse {
        match self.save(query, body).await {
            Ok(response) => HttpResponse::json(200, &response),
            Err(e) => HttpResponse::json(e.status_code(), &SaveResponse::error(e.to_string())),
        }
    }

    /// Handles `GET /load`.
    pub async fn handle_load(&self, query: &str) -> HttpResponse {
        match self.load(query).await {
            Ok(response) => HttpResponse::json(200, &response),
            Err(e) => HttpResponse::json(e.status_code(), &LoadResponse::error(e.to_string())),
        }
    }

    async fn save(&self, query: &str, body: &[u8]) -> ServerResult<SaveResponse> {
        let dataset = self.context.dataset(query)?;
        let request: SaveRequest = serde_json::from_slice(body)
            .map_err(|e| ServerError::InvalidInput(format!("malformed body: {e}")))?;

        let max = self.context.config.max_batch_records;
        if request.data.len() > max {
            return Err(ServerError::InvalidInput(format!(
                "too many records: {} > {max}",
                request.data.len()
            )));
        }

        debug!(dataset = %dataset, records = request.data.len(), "save request");
        let mode = request.mode();
        let outcome = self.context.saves.try_save(request.data, &dataset, mode).await?;
        Ok(SaveResponse::success(outcome.merged, outcome.records_written))
    }

    async fn load(&self, query: &str) -> ServerResult<LoadResponse> {
        let dataset = self.context.dataset(query)?;
        let (document, source) = self.context.loader.load(&dataset).await?;
        Ok(LoadResponse::success(
            document.map(|d| d.into_records()),
            source,
        ))
    }
}
