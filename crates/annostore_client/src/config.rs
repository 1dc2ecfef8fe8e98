//! Configuration for the save coordinator.

use std::time::Duration;

/// Configuration for batching saves.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Quiet period after the first enqueue before a partition flushes.
    pub debounce: Duration,
    /// Queue length at which a partition flushes without waiting.
    pub high_water_mark: usize,
    /// Upper bound on one flush's network call. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl CoordinatorConfig {
    /// Creates a configuration with default batching.
    pub fn new() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            high_water_mark: 10,
            request_timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Sets the debounce delay.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the high-water mark. Values below 1 are raised to 1.
    pub fn with_high_water_mark(mut self, mark: usize) -> Self {
        self.high_water_mark = mark.max(1);
        self
    }

    /// Sets the request timeout. `None` disables it.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new()
    }
}
