//! Debounced, coalescing, single-flight save batching.

use crate::config::CoordinatorConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::SaveTransport;
use annostore_model::{coalesce_by_key, DatasetId, Record, SaveMode};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Counters for flush activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Network calls made.
    pub flushes: u64,
    /// Records sent after coalescing.
    pub records_sent: u64,
    /// Queued records dropped in favour of a later record with the same key.
    pub records_coalesced: u64,
    /// Flushes whose batch was rejected.
    pub failed_flushes: u64,
}

/// Handle to one enqueued record.
///
/// Resolves once the flush carrying the record has settled. Dropping the
/// handle does not cancel the save.
#[must_use = "the save outcome is only observable through this handle"]
pub struct PendingSave {
    state: PendingState,
}

enum PendingState {
    Waiting(oneshot::Receiver<ClientResult<()>>),
    Ready(Option<ClientResult<()>>),
}

impl PendingSave {
    fn ready(result: ClientResult<()>) -> Self {
        Self {
            state: PendingState::Ready(Some(result)),
        }
    }
}

impl Future for PendingSave {
    type Output = ClientResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            PendingState::Ready(result) => {
                Poll::Ready(result.take().unwrap_or(Err(ClientError::Closed)))
            }
            PendingState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|settled| settled.unwrap_or(Err(ClientError::Closed))),
        }
    }
}

struct Queued {
    record: Record,
    done: oneshot::Sender<ClientResult<()>>,
}

/// Per-dataset state: pending queue, debounce timer and in-flight flag.
#[derive(Default)]
struct Partition {
    pending: Vec<Queued>,
    timer: Option<JoinHandle<()>>,
    in_flight: bool,
}

impl Partition {
    fn start_flight(&mut self) -> Vec<Queued> {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.in_flight = true;
        std::mem::take(&mut self.pending)
    }

    fn is_idle(&self) -> bool {
        !self.in_flight && self.timer.is_none() && self.pending.is_empty()
    }
}

struct Shared {
    transport: Arc<dyn SaveTransport>,
    config: CoordinatorConfig,
    /// Only datasets with queued, scheduled or in-flight work have an entry.
    partitions: Mutex<HashMap<DatasetId, Partition>>,
    flight_done: Notify,
    closed: AtomicBool,
    stats: Mutex<CoordinatorStats>,
}

/// Batches individual record saves into as few network calls as possible.
///
/// Each dataset is an independent partition. A partition flushes
/// `debounce` after the first record enqueued since its last flush, or at
/// once when its queue reaches `high_water_mark`. At most one flush per
/// partition is in flight; records enqueued meanwhile wait for the next one,
/// so saves from one coordinator are never reordered.
///
/// All methods that can start a flush must be called from within a tokio
/// runtime.
///
/// # Example
///
/// ```
/// use annostore_client::{CoordinatorConfig, MockTransport, SaveCoordinator};
/// use annostore_model::{DatasetId, Record};
/// use std::sync::Arc;
///
/// # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
/// # rt.block_on(async {
/// let transport = Arc::new(MockTransport::new());
/// let coordinator = SaveCoordinator::new(transport.clone(), CoordinatorConfig::default());
/// let north = DatasetId::new("north").unwrap();
///
/// let first = coordinator.enqueue(Record::with_key("a.jpg").with("label", "cat"), north.clone());
/// let second = coordinator.enqueue(Record::with_key("b.jpg").with("label", "dog"), north);
/// assert!(first.await.is_ok());
/// assert!(second.await.is_ok());
/// assert_eq!(transport.calls().len(), 1);
/// # });
/// ```
pub struct SaveCoordinator {
    shared: Arc<Shared>,
}

impl SaveCoordinator {
    /// Creates a coordinator sending through `transport`.
    pub fn new(transport: Arc<dyn SaveTransport>, config: CoordinatorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                partitions: Mutex::new(HashMap::new()),
                flight_done: Notify::new(),
                closed: AtomicBool::new(false),
                stats: Mutex::new(CoordinatorStats::default()),
            }),
        }
    }

    /// Queues a record for the dataset and returns immediately.
    ///
    /// Records without a key, and any record enqueued after [`close`], are
    /// rejected without being queued.
    ///
    /// [`close`]: SaveCoordinator::close
    pub fn enqueue(&self, record: Record, dataset: DatasetId) -> PendingSave {
        if self.shared.closed.load(Ordering::SeqCst) {
            return PendingSave::ready(Err(ClientError::Closed));
        }
        if record.key().is_none() {
            return PendingSave::ready(Err(ClientError::InvalidRecord(
                "record has no key".into(),
            )));
        }

        let (done, rx) = oneshot::channel();
        let batch = {
            let mut partitions = self.shared.partitions.lock();
            let partition = partitions.entry(dataset.clone()).or_default();
            partition.pending.push(Queued { record, done });
            self.shared.schedule(&dataset, partition)
        };
        if let Some(batch) = batch {
            self.shared.spawn_flight(dataset, batch);
        }

        PendingSave {
            state: PendingState::Waiting(rx),
        }
    }

    /// Flushes every partition now and waits until all of them are idle
    /// with empty queues.
    pub async fn flush_all(&self) {
        loop {
            let notified = self.shared.flight_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (batches, busy) = {
                let mut partitions = self.shared.partitions.lock();
                let mut batches = Vec::new();
                let mut busy = false;
                for (dataset, partition) in partitions.iter_mut() {
                    if partition.in_flight {
                        busy = true;
                    } else if !partition.pending.is_empty() {
                        batches.push((dataset.clone(), partition.start_flight()));
                    }
                }
                (batches, busy)
            };

            if batches.is_empty() && !busy {
                return;
            }
            for (dataset, batch) in batches {
                self.shared.spawn_flight(dataset, batch);
            }
            notified.await;
        }
    }

    /// Cancels pending timers and rejects every queued record with
    /// [`ClientError::Closed`]. Flushes already in flight still settle.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);

        let dropped: Vec<Queued> = {
            let mut partitions = self.shared.partitions.lock();
            let dropped = partitions
                .values_mut()
                .flat_map(|partition| {
                    if let Some(timer) = partition.timer.take() {
                        timer.abort();
                    }
                    std::mem::take(&mut partition.pending)
                })
                .collect();
            partitions.retain(|_, partition| partition.in_flight);
            dropped
        };
        for queued in dropped {
            let _ = queued.done.send(Err(ClientError::Closed));
        }
    }

    /// Returns true once [`close`](SaveCoordinator::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Number of records waiting for the next flush of a dataset.
    pub fn pending_len(&self, dataset: &DatasetId) -> usize {
        self.shared
            .partitions
            .lock()
            .get(dataset)
            .map_or(0, |partition| partition.pending.len())
    }

    /// Returns the current counters.
    pub fn stats(&self) -> CoordinatorStats {
        self.shared.stats.lock().clone()
    }
}

impl Shared {
    /// Decides what a partition does next: start a flight now, arm the
    /// debounce timer, or wait for the flight in progress.
    fn schedule(self: &Arc<Self>, dataset: &DatasetId, partition: &mut Partition) -> Option<Vec<Queued>> {
        if partition.in_flight || partition.pending.is_empty() {
            return None;
        }
        if partition.pending.len() >= self.config.high_water_mark {
            debug!(dataset = %dataset, queued = partition.pending.len(), "high-water mark reached");
            return Some(partition.start_flight());
        }
        if partition.timer.is_none() {
            let shared = Arc::clone(self);
            let dataset = dataset.clone();
            let delay = self.config.debounce;
            partition.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                shared.debounce_elapsed(dataset);
            }));
        }
        None
    }

    fn debounce_elapsed(self: &Arc<Self>, dataset: DatasetId) {
        let batch = {
            let mut partitions = self.partitions.lock();
            let Some(partition) = partitions.get_mut(&dataset) else {
                return;
            };
            // This task is the timer; it must not abort itself.
            partition.timer = None;
            if partition.is_idle() {
                partitions.remove(&dataset);
                return;
            }
            if partition.in_flight || partition.pending.is_empty() {
                return;
            }
            partition.start_flight()
        };
        self.spawn_flight(dataset, batch);
    }

    fn spawn_flight(self: &Arc<Self>, dataset: DatasetId, batch: Vec<Queued>) {
        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.fly(dataset, batch).await });
    }

    async fn fly(self: Arc<Self>, dataset: DatasetId, batch: Vec<Queued>) {
        let (records, waiters): (Vec<_>, Vec<_>) = batch
            .into_iter()
            .map(|queued| (queued.record, queued.done))
            .unzip();
        let queued = records.len();
        let records = coalesce_by_key(records);
        let sent = records.len();
        debug!(dataset = %dataset, queued, sent, "flushing");

        let call = self.transport.save(&dataset, records, SaveMode::Merge);
        let result = match self.config.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(ClientError::Timeout(limit)),
            },
            None => call.await,
        };
        let result = result.map(|_| ());

        {
            let mut stats = self.stats.lock();
            stats.flushes += 1;
            stats.records_sent += sent as u64;
            stats.records_coalesced += (queued - sent) as u64;
            if result.is_err() {
                stats.failed_flushes += 1;
            }
        }
        if let Err(e) = &result {
            warn!(dataset = %dataset, records = queued, error = %e, "flush failed");
        }
        for done in waiters {
            let _ = done.send(result.clone());
        }

        let next = {
            let mut partitions = self.partitions.lock();
            let next = partitions.get_mut(&dataset).and_then(|partition| {
                partition.in_flight = false;
                self.schedule(&dataset, partition)
            });
            if partitions.get(&dataset).is_some_and(Partition::is_idle) {
                partitions.remove(&dataset);
            }
            next
        };
        if let Some(batch) = next {
            self.spawn_flight(dataset, batch);
        }
        self.flight_done.notify_waiters();
    }
}
