use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::Duration;

use games_shared::constants::{RETRY_BACKOFF_BASE_MS, RETRY_BACKOFF_MAX_MS};

pub struct RetryStrategy {
    max_retries: u32,
}

impl RetryStrategy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(RETRY_BACKOFF_BASE_MS))
            .with_max_interval(Duration::from_millis(RETRY_BACKOFF_MAX_MS))
            .with_multiplier(2.0)
            .with_max_elapsed_time(Some(Duration::from_secs(120)))
            .build()
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    pub fn is_retryable_error(&self, error: &str) -> bool {
        // Transient transport and server-side failures; JSON-RPC application
        // errors (reverts, unknown rounds) are not retried.
        error.contains("timeout")
            || error.contains("connection")
            || error.contains("network")
            || error.contains("502")
            || error.contains("503")
            || error.contains("504")
            || error.contains("429")
            || error.contains("rate limit")
    }
}
