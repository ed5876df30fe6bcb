//! Retry with exponential backoff for transiently failing operations.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use a2e_error::{A2eError, Result};

/// Retry configuration.
///
/// An operation is attempted at most `max_retries + 1` times. Delays
/// follow `initial · base^attempt`, capped at `max_delay`, with ±10%
/// jitter when enabled. Whether an error is retryable is decided by
/// [`A2eError::is_retryable`]: network failures, timeouts, and HTTP
/// statuses in the retry set (408, 429, 500, 502, 503, 504).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub base: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            base: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            ..Self::default()
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before re-attempting after `attempt` (0-indexed) failures.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponential = self.initial_delay.as_secs_f64() * self.base.powi(attempt as i32);
        let capped = exponential.min(self.max_delay.as_secs_f64());

        let factor = if self.jitter {
            rand::rng().random_range(0.9..=1.1)
        } else {
            1.0
        };
        Duration::from_secs_f64(capped * factor)
    }
}

/// Run an operation with retry.
///
/// Non-retryable errors abort immediately; on exhaustion the last error is
/// surfaced.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_retries + 1;

    for attempt in 0..attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation = operation_name, retries = attempt, "succeeded after retries");
                }
                return Ok(value);
            }
            Err(error) if !error.is_retryable() => {
                warn!(operation = operation_name, error = %error, "non-retryable failure");
                return Err(error);
            }
            Err(error) => {
                if attempt + 1 == attempts {
                    warn!(
                        operation = operation_name,
                        attempts, error = %error, "retries exhausted"
                    );
                    return Err(error);
                }
                // Respect an explicit server hint over the backoff curve.
                let delay = error
                    .retry_after
                    .unwrap_or_else(|| policy.delay_for_attempt(attempt));
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying after transient failure"
                );
                sleep(delay).await;
            }
        }
    }

    // Unreachable: the loop always returns. Kept for the type checker.
    Err(A2eError::execution(format!(
        "retry loop for '{operation_name}' ended without a result"
    )))
}
