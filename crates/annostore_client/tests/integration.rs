//! Integration tests for the save coordinator against a real server.

use annostore_client::{
    ClientError, CoordinatorConfig, HttpReply, HttpTransport, LoopbackClient, LoopbackServer,
    SaveCoordinator, SaveTransport,
};
use annostore_model::{DatasetId, LoadSource, Record, SaveMode};
use annostore_server::{AnnotationServer, RetryConfig, ServerConfig};
use annostore_storage::{BlobStore, InMemoryBlobStore};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Routes loopback requests into an in-process server.
struct InProcess(Arc<AnnotationServer>);

#[async_trait]
impl LoopbackServer for InProcess {
    async fn handle(&self, method: &str, target: &str, body: &[u8]) -> HttpReply {
        let response = self.0.handle_request(method, target, body).await;
        HttpReply::new(response.status, response.body)
    }
}

type Transport = HttpTransport<LoopbackClient<InProcess>>;

fn setup(config: ServerConfig) -> (Arc<InMemoryBlobStore>, Arc<AnnotationServer>, Arc<Transport>) {
    let store = Arc::new(InMemoryBlobStore::new());
    let server = Arc::new(AnnotationServer::new(config, store.clone()));
    let transport = Arc::new(HttpTransport::new(
        "http://annotations.local",
        LoopbackClient::new(InProcess(Arc::clone(&server))),
    ));
    (store, server, transport)
}

fn fast_config() -> ServerConfig {
    ServerConfig::new().with_retry(
        RetryConfig::new(3)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false),
    )
}

fn north() -> DatasetId {
    DatasetId::new("north").unwrap()
}

#[tokio::test]
async fn enqueued_records_reach_the_store() {
    let (_, server, transport) = setup(fast_config());
    let coordinator = SaveCoordinator::new(transport.clone(), CoordinatorConfig::default());

    let handles: Vec<_> = ["a.jpg", "b.jpg", "c.jpg"]
        .into_iter()
        .map(|key| coordinator.enqueue(Record::with_key(key).with("label", "cat"), north()))
        .collect();
    coordinator.flush_all().await;
    for handle in handles {
        assert_eq!(handle.await, Ok(()));
    }

    let (document, source) = server.load(&north()).await.unwrap();
    let document = document.unwrap();
    assert_eq!(source, LoadSource::Store);
    assert_eq!(document.len(), 3);
    assert_eq!(document.get("c.jpg").unwrap().position(), Some(3));
    assert_eq!(coordinator.stats().flushes, 1);
}

#[tokio::test]
async fn two_clients_merge_into_one_document() {
    let (store, _, transport) = setup(fast_config());
    store.inject_conflicts(1);
    let first = SaveCoordinator::new(transport.clone(), CoordinatorConfig::default());
    let second = SaveCoordinator::new(transport.clone(), CoordinatorConfig::default());

    let a = first.enqueue(Record::with_key("a.jpg"), north());
    let b = second.enqueue(Record::with_key("b.jpg"), north());
    tokio::join!(first.flush_all(), second.flush_all());
    assert_eq!(a.await, Ok(()));
    assert_eq!(b.await, Ok(()));

    let loaded = transport.load(&north()).await.unwrap();
    let data = loaded.data.unwrap();
    assert_eq!(data.len(), 2);
}

#[tokio::test]
async fn edits_update_in_place() {
    let (_, server, transport) = setup(fast_config());
    let coordinator = SaveCoordinator::new(transport.clone(), CoordinatorConfig::default());

    for key in ["a", "b", "c"] {
        let _ = coordinator.enqueue(Record::with_key(key).with("v", 0), north());
    }
    coordinator.flush_all().await;

    let edit = coordinator.enqueue(Record::with_key("b").with("v", 7), north());
    coordinator.flush_all().await;
    assert_eq!(edit.await, Ok(()));

    let (document, _) = server.load(&north()).await.unwrap();
    let document = document.unwrap();
    let keys: Vec<_> = document.records().iter().filter_map(|r| r.key()).collect();
    assert_eq!(keys, vec!["a", "b", "c"]);
    assert_eq!(document.get("b").unwrap().get("v"), Some(&json!(7)));
    assert_eq!(document.get("b").unwrap().position(), Some(2));
}

#[tokio::test]
async fn exhausted_server_retries_reject_the_batch() {
    let (store, _, transport) = setup(fast_config());
    store.inject_conflicts(usize::MAX);
    let coordinator = SaveCoordinator::new(transport, CoordinatorConfig::default());

    let a = coordinator.enqueue(Record::with_key("a"), north());
    let b = coordinator.enqueue(Record::with_key("b"), north());
    coordinator.flush_all().await;

    for result in [a.await, b.await] {
        match result {
            Err(ClientError::Rejected { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected 503 rejection, got {other:?}"),
        }
    }
    assert!(store.snapshot(&north().object_path()).is_none());
}

#[tokio::test]
async fn unlisted_dataset_is_rejected_by_server() {
    let (_, _, transport) = setup(fast_config().with_datasets([north()]));
    let coordinator = SaveCoordinator::new(transport, CoordinatorConfig::default());

    let result = coordinator.enqueue(Record::with_key("a"), DatasetId::new("south").unwrap());
    coordinator.flush_all().await;
    assert!(matches!(
        result.await,
        Err(ClientError::Rejected { status: 400, .. })
    ));
}

#[tokio::test]
async fn replace_through_transport() {
    let (_, server, transport) = setup(fast_config());
    transport
        .save(&north(), vec![Record::with_key("old")], SaveMode::Merge)
        .await
        .unwrap();

    let response = transport
        .save(
            &north(),
            vec![Record::with_key("x"), Record::with_key("y")],
            SaveMode::Replace,
        )
        .await
        .unwrap();
    assert_eq!(response.merged, Some(false));

    let (document, _) = server.load(&north()).await.unwrap();
    let document = document.unwrap();
    assert_eq!(document.len(), 2);
    assert!(document.get("old").is_none());
}

#[tokio::test]
async fn load_falls_back_to_legacy_store() {
    let legacy = Arc::new(InMemoryBlobStore::new());
    legacy
        .put(&north().object_path(), br#"[{"key":"legacy.jpg","S.No":1}]"#)
        .await
        .unwrap();
    let server = Arc::new(
        AnnotationServer::new(fast_config(), Arc::new(InMemoryBlobStore::new()))
            .with_fallback(legacy),
    );
    let transport = HttpTransport::new("http://annotations.local", LoopbackClient::new(InProcess(server)));

    let loaded = transport.load(&north()).await.unwrap();
    assert_eq!(loaded.source, Some(LoadSource::Fallback));
    assert_eq!(loaded.data.unwrap()[0].key(), Some("legacy.jpg"));
}
