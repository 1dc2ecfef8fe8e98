//! HTTP transport implementation.
//!
//! This module provides an HTTP-based transport for the save coordinator.
//! The actual HTTP client is abstracted via a trait to allow different
//! implementations (reqwest, hyper, etc.).

use crate::error::{ClientError, ClientResult};
use crate::transport::SaveTransport;
use annostore_model::{DatasetId, LoadResponse, Record, SaveMode, SaveRequest, SaveResponse};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpReply {
    /// Creates a reply.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. `Err` means
/// the request never got an answer; any answer, including a failure
/// status, is an `Ok` reply.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body.
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, String>;

    /// Sends a GET request.
    async fn get(&self, url: &str) -> Result<HttpReply, String>;
}

/// HTTP-based save transport.
///
/// Uses JSON request and response bodies.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the annotation server (e.g., "https://annotations.example.com").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn url(&self, endpoint: &str, dataset: &DatasetId) -> String {
        format!("{}{endpoint}?dataset={dataset}", self.base_url)
    }

    fn decode<T: DeserializeOwned>(&self, reply: &HttpReply) -> ClientResult<T> {
        serde_json::from_slice(&reply.body)
            .map_err(|e| ClientError::Protocol(format!("failed to decode response: {e}")))
    }

    fn record<T>(&self, result: ClientResult<T>) -> ClientResult<T> {
        match &result {
            Ok(_) => *self.last_error.write() = None,
            Err(e) => *self.last_error.write() = Some(e.to_string()),
        }
        result
    }

    async fn post_save(&self, url: &str, body: Vec<u8>) -> ClientResult<SaveResponse> {
        let reply = self
            .client
            .post(url, body)
            .await
            .map_err(|e| ClientError::transport_retryable(e))?;
        if !reply.is_success() {
            return Err(rejected(&reply));
        }
        let response: SaveResponse = self.decode(&reply)?;
        if !response.success {
            return Err(ClientError::Rejected {
                status: reply.status,
                message: response.error.unwrap_or_default(),
            });
        }
        Ok(response)
    }

    async fn get_load(&self, url: &str) -> ClientResult<LoadResponse> {
        let reply = self
            .client
            .get(url)
            .await
            .map_err(|e| ClientError::transport_retryable(e))?;
        if !reply.is_success() {
            return Err(rejected(&reply));
        }
        self.decode(&reply)
    }
}

/// Builds a rejection from a failure reply, taking the message from the
/// JSON body when there is one.
fn rejected(reply: &HttpReply) -> ClientError {
    #[derive(serde::Deserialize)]
    struct Failure {
        error: Option<String>,
    }
    let message = serde_json::from_slice::<Failure>(&reply.body)
        .ok()
        .and_then(|f| f.error)
        .unwrap_or_else(|| String::from_utf8_lossy(&reply.body).into_owned());
    ClientError::Rejected {
        status: reply.status,
        message,
    }
}

#[async_trait]
impl<C: HttpClient> SaveTransport for HttpTransport<C> {
    async fn save(
        &self,
        dataset: &DatasetId,
        records: Vec<Record>,
        mode: SaveMode,
    ) -> ClientResult<SaveResponse> {
        let body = serde_json::to_vec(&SaveRequest::with_mode(records, mode))
            .map_err(|e| ClientError::Protocol(format!("failed to encode request: {e}")))?;
        let url = self.url("/save", dataset);
        debug!(%url, bytes = body.len(), "posting save");
        let result = self.post_save(&url, body).await;
        self.record(result)
    }

    async fn load(&self, dataset: &DatasetId) -> ClientResult<LoadResponse> {
        let url = self.url("/load", dataset);
        let result = self.get_load(&url).await;
        self.record(result)
    }
}

/// A loopback HTTP client that routes requests directly to an in-process
/// server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

/// Trait for servers that can handle loopback requests.
#[async_trait]
pub trait LoopbackServer: Send + Sync {
    /// Handles a request for `target` (path and query) and returns the reply.
    async fn handle(&self, method: &str, target: &str, body: &[u8]) -> HttpReply;
}

/// Strips scheme and authority from a URL, leaving `path?query`.
fn request_target(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.find('/').map_or("/", |i| &rest[i..])
}

#[async_trait]
impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, String> {
        Ok(self.server.handle("POST", request_target(url), &body).await)
    }

    async fn get(&self, url: &str) -> Result<HttpReply, String> {
        Ok(self.server.handle("GET", request_target(url), &[]).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annostore_model::LoadSource;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct TestClient {
        reply: Mutex<Option<Result<HttpReply, String>>>,
        requests: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl TestClient {
        fn replying(reply: Result<HttpReply, String>) -> Self {
            let client = Self::default();
            *client.reply.lock() = Some(reply);
            client
        }

        fn respond(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, String> {
            self.requests.lock().push((url.to_string(), body));
            self.reply
                .lock()
                .clone()
                .unwrap_or_else(|| Err("no reply set".into()))
        }
    }

    #[async_trait]
    impl HttpClient for TestClient {
        async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, String> {
            self.respond(url, body)
        }

        async fn get(&self, url: &str) -> Result<HttpReply, String> {
            self.respond(url, Vec::new())
        }
    }

    fn north() -> DatasetId {
        DatasetId::new("north").unwrap()
    }

    #[test]
    fn transport_creation() {
        let transport = HttpTransport::new("https://annotations.example.com/", TestClient::default());
        assert_eq!(transport.base_url(), "https://annotations.example.com");
        assert!(transport.last_error().is_none());
    }

    #[test]
    fn request_targets() {
        assert_eq!(request_target("http://h:8080/save?dataset=a"), "/save?dataset=a");
        assert_eq!(request_target("/load?dataset=a"), "/load?dataset=a");
        assert_eq!(request_target("http://host"), "/");
    }

    #[tokio::test]
    async fn save_posts_json_request() {
        let reply = HttpReply::new(200, br#"{"success":true,"merged":true,"imagesUpdated":1}"#.to_vec());
        let transport = HttpTransport::new("http://h", TestClient::replying(Ok(reply)));

        let response = transport
            .save(&north(), vec![Record::with_key("a")], SaveMode::Merge)
            .await
            .unwrap();
        assert_eq!(response.images_updated, Some(1));

        let requests = transport.client.requests.lock().clone();
        assert_eq!(requests[0].0, "http://h/save?dataset=north");
        let sent: SaveRequest = serde_json::from_slice(&requests[0].1).unwrap();
        assert_eq!(sent, SaveRequest::merge(vec![Record::with_key("a")]));
    }

    #[tokio::test]
    async fn failure_status_is_rejected_with_message() {
        let reply = HttpReply::new(503, br#"{"success":false,"error":"gave up"}"#.to_vec());
        let transport = HttpTransport::new("http://h", TestClient::replying(Ok(reply)));

        let result = transport
            .save(&north(), vec![Record::with_key("a")], SaveMode::Merge)
            .await;
        assert_eq!(
            result,
            Err(ClientError::Rejected {
                status: 503,
                message: "gave up".into()
            })
        );
        assert!(transport.last_error().is_some());
    }

    #[tokio::test]
    async fn unreachable_server_is_retryable_transport_error() {
        let transport = HttpTransport::new("http://h", TestClient::replying(Err("refused".into())));
        let result = transport.load(&north()).await;
        assert!(matches!(
            result,
            Err(ClientError::Transport { retryable: true, .. })
        ));
    }

    #[tokio::test]
    async fn garbage_body_is_protocol_error() {
        let transport = HttpTransport::new(
            "http://h",
            TestClient::replying(Ok(HttpReply::new(200, b"<html>".to_vec()))),
        );
        let result = transport.load(&north()).await;
        assert!(matches!(result, Err(ClientError::Protocol(_))));
    }

    #[tokio::test]
    async fn load_decodes_response() {
        let reply = HttpReply::new(200, br#"{"success":true,"data":null,"source":"store"}"#.to_vec());
        let transport = HttpTransport::new("http://h", TestClient::replying(Ok(reply)));
        let response = transport.load(&north()).await.unwrap();
        assert!(response.data.is_none());
        assert_eq!(response.source, Some(LoadSource::Store));
        assert!(transport.last_error().is_none());
    }
}
