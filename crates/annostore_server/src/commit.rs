//! Optimistic merge-and-commit of record batches.

use crate::config::{RetryConfig, ServerConfig};
use crate::error::{ServerError, ServerResult};
use annostore_model::{coalesce_by_key, validate_keys, DatasetId, Document, Record, SaveMode};
use annostore_storage::{BlobStore, Generation, StorageError};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// State of a single save call.
///
/// ```text
/// Attempting(1) -> Committed
///               -> Retrying(2) -> Attempting(2) -> ...
///               -> Failed
/// ```
#[derive(Debug)]
pub enum CommitState {
    /// Reading, merging and conditionally writing, attempt `n`.
    Attempting(u32),
    /// Backing off before attempt `n`.
    Retrying(u32),
    /// The write landed with this generation.
    Committed(Generation),
    /// Attempts exhausted or a non-conflict error occurred.
    Failed(ServerError),
}

/// Result of a committed save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Generation of the committed document.
    pub generation: Generation,
    /// Number of attempts it took.
    pub attempts: u32,
    /// Distinct records written by the batch.
    pub records_written: usize,
    /// Length of the committed document.
    pub document_len: usize,
    /// Whether the batch was merged rather than replacing the document.
    pub merged: bool,
}

/// Counters for save activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveStats {
    /// Saves that committed.
    pub commits: u64,
    /// Conditional writes rejected for a stale generation.
    pub conflicts: u64,
    /// Retries started after a conflict.
    pub retries: u64,
    /// Saves that failed after touching the store.
    pub failures: u64,
    /// Saves rejected before touching the store.
    pub rejected: u64,
}

/// Time budget of one save.
///
/// Reads and backoff are cut off when the budget runs out. A store write is
/// only issued while budget remains, and once issued it runs to completion
/// so the reported result always matches what the store holds.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Option<(Instant, Duration)>,
}

impl Deadline {
    fn starting_now(limit: Option<Duration>) -> Self {
        Self {
            at: limit.map(|limit| (Instant::now() + limit, limit)),
        }
    }

    fn check(&self) -> ServerResult<()> {
        match self.at {
            Some((at, limit)) if Instant::now() >= at => Err(ServerError::Timeout(limit)),
            _ => Ok(()),
        }
    }

    /// Runs `fut`, giving up when the budget runs out. Only for work that is
    /// safe to abandon.
    async fn bound<F: Future>(&self, fut: F) -> ServerResult<F::Output> {
        match self.at {
            Some((at, limit)) => tokio::time::timeout_at(at, fut)
                .await
                .map_err(|_| ServerError::Timeout(limit)),
            None => Ok(fut.await),
        }
    }
}

/// Merges record batches into dataset documents against concurrent writers.
///
/// Each attempt reads the document fresh, merges the batch by key and writes
/// back only if the generation is unchanged. A lost race is retried with
/// backoff up to [`RetryConfig::max_attempts`]; any other store error ends
/// the save immediately. A failed save never modifies the stored document.
///
/// The save timeout applies to reads, backoff and the decision to write.
/// A write that has started is awaited to completion, so a save that
/// reports [`ServerError::Timeout`] has not changed the document.
pub struct SaveService {
    store: Arc<dyn BlobStore>,
    retry: RetryConfig,
    save_timeout: Option<Duration>,
    stats: RwLock<SaveStats>,
}

impl SaveService {
    /// Creates a save service over the given store.
    pub fn new(store: Arc<dyn BlobStore>, config: &ServerConfig) -> Self {
        Self {
            store,
            retry: config.retry.clone(),
            save_timeout: config.save_timeout,
            stats: RwLock::new(SaveStats::default()),
        }
    }

    /// Returns the current counters.
    pub fn stats(&self) -> SaveStats {
        self.stats.read().clone()
    }

    /// Merges a partial batch into the dataset, returning whether it
    /// committed.
    pub async fn save(&self, records: Vec<Record>, dataset: &DatasetId) -> bool {
        self.try_save(records, dataset, SaveMode::Merge).await.is_ok()
    }

    /// Saves a batch and reports how it went.
    ///
    /// # Errors
    ///
    /// - [`ServerError::InvalidInput`] for an empty batch or a keyless
    ///   record, before any store access
    /// - [`ServerError::ConcurrentModification`] when every attempt lost
    /// - [`ServerError::StorageUnavailable`] or
    ///   [`ServerError::CorruptDocument`] for store failures
    /// - [`ServerError::Timeout`] when the configured save timeout elapsed
    ///   before the write was issued
    pub async fn try_save(
        &self,
        records: Vec<Record>,
        dataset: &DatasetId,
        mode: SaveMode,
    ) -> ServerResult<SaveOutcome> {
        // An empty merge result would wipe the document.
        if records.is_empty() {
            self.stats.write().rejected += 1;
            return Err(ServerError::InvalidInput("no records to save".into()));
        }
        if let Err(e) = validate_keys(&records) {
            self.stats.write().rejected += 1;
            return Err(e.into());
        }
        let records = coalesce_by_key(records);

        let deadline = Deadline::starting_now(self.save_timeout);
        let result = match mode {
            SaveMode::Merge => self.commit_merge(records, dataset, deadline).await,
            SaveMode::Replace => self.commit_replace(records, dataset, deadline).await,
        };

        match &result {
            Ok(outcome) => {
                self.stats.write().commits += 1;
                info!(
                    dataset = %dataset,
                    generation = %outcome.generation,
                    attempts = outcome.attempts,
                    records = outcome.records_written,
                    "save committed"
                );
            }
            Err(e) => {
                self.stats.write().failures += 1;
                warn!(dataset = %dataset, error = %e, "save failed");
            }
        }
        result
    }

    async fn commit_merge(
        &self,
        records: Vec<Record>,
        dataset: &DatasetId,
        deadline: Deadline,
    ) -> ServerResult<SaveOutcome> {
        let path = dataset.object_path();
        let max_attempts = self.retry.max_attempts;
        let mut document_len = 0;
        let mut attempts = 0;
        let mut state = CommitState::Attempting(1);

        loop {
            state = match state {
                CommitState::Attempting(n) => {
                    attempts = n;
                    debug!(dataset = %dataset, attempt = n, "attempting commit");
                    match self.attempt_merge(&path, &records, n, deadline).await {
                        Ok((generation, len)) => {
                            document_len = len;
                            CommitState::Committed(generation)
                        }
                        Err(ServerError::ConcurrentModification { .. }) if n < max_attempts => {
                            self.stats.write().conflicts += 1;
                            CommitState::Retrying(n + 1)
                        }
                        Err(e) => {
                            if matches!(e, ServerError::ConcurrentModification { .. }) {
                                self.stats.write().conflicts += 1;
                            }
                            CommitState::Failed(e)
                        }
                    }
                }
                CommitState::Retrying(n) => {
                    let delay = self.retry.delay_for_attempt(n - 1);
                    debug!(dataset = %dataset, next_attempt = n, ?delay, "generation conflict, backing off");
                    self.stats.write().retries += 1;
                    match deadline.bound(tokio::time::sleep(delay)).await {
                        Ok(()) => CommitState::Attempting(n),
                        Err(e) => CommitState::Failed(e),
                    }
                }
                CommitState::Committed(generation) => {
                    return Ok(SaveOutcome {
                        generation,
                        attempts,
                        records_written: records.len(),
                        document_len,
                        merged: true,
                    });
                }
                CommitState::Failed(e) => return Err(e),
            };
        }
    }

    /// One read-merge-write pass. A lost generation race is reported as
    /// [`ServerError::ConcurrentModification`].
    async fn attempt_merge(
        &self,
        path: &str,
        records: &[Record],
        attempt: u32,
        deadline: Deadline,
    ) -> ServerResult<(Generation, usize)> {
        deadline.check()?;
        let (document, expected) = match deadline.bound(self.store.get(path)).await?? {
            Some(blob) => (
                Document::from_slice(&blob.data).map_err(ServerError::CorruptDocument)?,
                blob.generation,
            ),
            None => (Document::new(), Generation::ABSENT),
        };

        let merged = document.merge(records.to_vec());
        let bytes = merged.to_vec().map_err(ServerError::CorruptDocument)?;

        // Last point where the save can still give up without side effects.
        deadline.check()?;
        match self.store.put_if_generation(path, &bytes, expected).await {
            Ok(generation) => Ok((generation, merged.len())),
            Err(StorageError::PreconditionFailed { expected, actual }) => {
                debug!(path, %expected, %actual, "stale generation");
                Err(ServerError::ConcurrentModification { attempts: attempt })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn commit_replace(
        &self,
        records: Vec<Record>,
        dataset: &DatasetId,
        deadline: Deadline,
    ) -> ServerResult<SaveOutcome> {
        let document = Document::replacing(records)?;
        let bytes = document.to_vec().map_err(ServerError::CorruptDocument)?;
        deadline.check()?;
        let generation = self.store.put(&dataset.object_path(), &bytes).await?;

        Ok(SaveOutcome {
            generation,
            attempts: 1,
            records_written: document.len(),
            document_len: document.len(),
            merged: false,
        })
    }
}
