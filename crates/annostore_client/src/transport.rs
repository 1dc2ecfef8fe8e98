//! Transport layer abstraction for save and load calls.

use crate::error::{ClientError, ClientResult};
use annostore_model::{
    merge_by_key, DatasetId, LoadResponse, LoadSource, Record, SaveMode, SaveResponse,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A save transport carries batches to the annotation server.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-process loopback, mock for testing).
#[async_trait]
pub trait SaveTransport: Send + Sync {
    /// Sends one batch. Returns `Ok` only if the server committed it.
    async fn save(
        &self,
        dataset: &DatasetId,
        records: Vec<Record>,
        mode: SaveMode,
    ) -> ClientResult<SaveResponse>;

    /// Loads a dataset's document.
    async fn load(&self, dataset: &DatasetId) -> ClientResult<LoadResponse>;
}

/// One call observed by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SaveCall {
    /// Target dataset.
    pub dataset: DatasetId,
    /// Records sent.
    pub records: Vec<Record>,
    /// Save mode.
    pub mode: SaveMode,
}

/// A mock transport for testing.
///
/// Keeps an in-memory document per dataset, records every save call, and
/// can delay or fail calls on demand.
#[derive(Debug, Default)]
pub struct MockTransport {
    calls: Mutex<Vec<SaveCall>>,
    failures: Mutex<VecDeque<ClientError>>,
    delay: Mutex<Duration>,
    documents: Mutex<HashMap<DatasetId, Vec<Record>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next save call fail with `error`. Queued failures are used
    /// in order.
    pub fn fail_next(&self, error: ClientError) {
        self.failures.lock().push_back(error);
    }

    /// Makes every save call take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Returns the save calls made so far.
    pub fn calls(&self) -> Vec<SaveCall> {
        self.calls.lock().clone()
    }

    /// Returns the highest number of save calls that were in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Returns the current document of a dataset.
    pub fn document(&self, dataset: &DatasetId) -> Option<Vec<Record>> {
        self.documents.lock().get(dataset).cloned()
    }
}

#[async_trait]
impl SaveTransport for MockTransport {
    async fn save(
        &self,
        dataset: &DatasetId,
        records: Vec<Record>,
        mode: SaveMode,
    ) -> ClientResult<SaveResponse> {
        self.calls.lock().push(SaveCall {
            dataset: dataset.clone(),
            records: records.clone(),
            mode,
        });
        let failure = self.failures.lock().pop_front();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = failure {
            return Err(error);
        }

        let written = records.len();
        let mut documents = self.documents.lock();
        let document = documents.entry(dataset.clone()).or_default();
        *document = match mode {
            SaveMode::Merge => merge_by_key(std::mem::take(document), records),
            SaveMode::Replace => merge_by_key(Vec::new(), records),
        };
        Ok(SaveResponse::success(mode == SaveMode::Merge, written))
    }

    async fn load(&self, dataset: &DatasetId) -> ClientResult<LoadResponse> {
        Ok(LoadResponse::success(
            self.document(dataset),
            LoadSource::Store,
        ))
    }
}
