//! Server configuration.

use annostore_model::DatasetId;
use rand::Rng;
use std::time::Duration;

/// Configuration for the annotation server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Retry behavior of the merge-and-commit loop.
    pub retry: RetryConfig,
    /// Upper bound on how long a single save may take, including retries.
    pub save_timeout: Option<Duration>,
    /// Maximum number of records accepted in one save request.
    pub max_batch_records: usize,
    /// Datasets the server accepts. Empty means any valid dataset id.
    pub datasets: Vec<DatasetId>,
}

impl ServerConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            save_timeout: Some(Duration::from_secs(30)),
            max_batch_records: 1000,
            datasets: Vec::new(),
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the save timeout. `None` disables it.
    pub fn with_save_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.save_timeout = timeout;
        self
    }

    /// Sets the maximum batch size.
    pub fn with_max_batch_records(mut self, max: usize) -> Self {
        self.max_batch_records = max;
        self
    }

    /// Restricts the server to a fixed set of datasets.
    pub fn with_datasets(mut self, datasets: impl IntoIterator<Item = DatasetId>) -> Self {
        self.datasets = datasets.into_iter().collect();
        self
    }

    /// Returns true if the dataset is served.
    pub fn accepts(&self, dataset: &DatasetId) -> bool {
        self.datasets.is_empty() || self.datasets.contains(dataset)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for conflict retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of commit attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.add_jitter = enabled;
        self
    }

    /// Calculates the delay before retry number `retry` (0 means the first
    /// attempt, which is never delayed).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(retry.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% jitter
            let jitter = delay_secs * 0.25 * rand::thread_rng().gen::<f64>();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
