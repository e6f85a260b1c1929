//! Retry driver for upload execution.
//!
//! Business logic raises transient failures (held hash locks, upstream 5xx)
//! upward unchanged; this driver re-runs them under bounded, jittered
//! exponential backoff. Unrecoverable errors pass straight through.

use std::future::Future;
use std::time::Duration;

use curator_core::TaskError;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(600),
        }
    }
}

impl RetryPolicy {
    pub async fn run<T, F, Fut>(&self, action: F) -> Result<T, TaskError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        // 2^n growth scaled to the base delay, capped, jittered.
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.base_delay.as_millis() as u64 / 2)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1));

        RetryIf::spawn(strategy, action, |err: &TaskError| err.is_recoverable()).await
    }

    /// Fast policy for tests.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }
}
