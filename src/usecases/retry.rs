//! Bounded retry with fixed backoff for transient backend failures.
//!
//! An explicit loop with an injected sleeper, so attempt counts and delays
//! are unit-testable without real timers. Control-signal errors (NotFound,
//! Conflict, Validation, Auth) propagate immediately.

use crate::domain::ApiError;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Retries after the first attempt. 2 means 3 attempts total.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Fixed delay between attempts.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Injected delay so tests can run the policy without timers.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// No-op sleeper for tests.
pub struct NoSleep;

#[async_trait::async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _duration: Duration) {}
}

/// Wraps gateway calls with bounded retries on transient failures.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            sleeper: Arc::new(TokioSleeper),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            max_retries,
            delay,
            sleeper,
        }
    }

    /// Policy with no delay between attempts. Used by tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO, Arc::new(NoSleep))
    }

    /// Run `op`, retrying transient failures up to `max_retries` extra
    /// times with a fixed delay. The last error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        label,
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "transient failure, retrying"
                    );
                    self.sleeper.sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
