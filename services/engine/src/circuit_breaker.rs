use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Per-endpoint circuit breaker for the RPC pool
///
/// Closed passes calls through, Open rejects them until the reset timeout
/// elapses, HalfOpen lets one probe decide.
#[derive(Clone)]
pub struct CircuitBreaker {
    failure_count: Arc<AtomicU64>,
    last_failure_time: Arc<RwLock<Option<Instant>>>,
    state: Arc<RwLock<CircuitState>>,
    failure_threshold: u64,
    reset_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u64, reset_timeout_seconds: u64) -> Self {
        Self {
            failure_count: Arc::new(AtomicU64::new(0)),
            last_failure_time: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(CircuitState::Closed)),
            failure_threshold,
            reset_timeout: Duration::from_secs(reset_timeout_seconds),
        }
    }

    /// Whether a call may proceed right now
    ///
    /// An open circuit past its reset timeout transitions to HalfOpen and
    /// admits the probe call.
    pub async fn allow_request(&self) -> bool {
        {
            let state = self.state.read().await;
            if *state != CircuitState::Open {
                return true;
            }
        }

        let last_failure = *self.last_failure_time.read().await;
        match last_failure {
            Some(last_time) if last_time.elapsed() > self.reset_timeout => {
                let mut state = self.state.write().await;
                *state = CircuitState::HalfOpen;
                tracing::info!("Circuit breaker transitioning to HalfOpen");
                true
            }
            _ => false,
        }
    }

    pub async fn on_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            *state = CircuitState::Closed;
            tracing::info!("Circuit breaker closed after successful probe");
        }
    }

    pub async fn on_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut last_failure = self.last_failure_time.write().await;
        *last_failure = Some(Instant::now());

        if failures >= self.failure_threshold {
            let mut state = self.state.write().await;
            *state = CircuitState::Open;
            tracing::warn!("Circuit breaker opened after {} failures", failures);
        }
    }

    pub async fn is_open(&self) -> bool {
        let state = self.state.read().await;
        *state == CircuitState::Open
    }
}
