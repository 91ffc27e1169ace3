//! Explicit retry policy with exponential backoff.
//!
//! Downstream calls that may hit a transient outage (storage appends,
//! alert delivery) are wrapped at the call site with [`RetryPolicy::run`].
//! A failed attempt logs a warning and sleeps; exhausting every attempt logs
//! exactly one terminal error and hands the last error back to the caller.

use std::future::Future;
use std::time::Duration;

use crate::error::CoreError;

/// Default number of attempts (including the first one).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the second attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Returned when every attempt failed.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed after {attempts} attempts: {last}")]
pub struct RetryError<E> {
    pub operation: String,
    pub attempts: u32,
    pub last: E,
}

/// Calculate the next backoff delay from the current delay.
///
/// The result is clamped to [`RetryPolicy::max_delay`].
pub fn next_delay(current: Duration, policy: &RetryPolicy) -> Duration {
    let next_ms = (current.as_millis() as f64 * policy.multiplier) as u64;
    Duration::from_millis(next_ms).min(policy.max_delay)
}

impl RetryPolicy {
    /// Build a doubling policy, validating the attempt count.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Result<Self, CoreError> {
        if max_attempts == 0 {
            return Err(CoreError::Validation(
                "retry max_attempts must be at least 1".into(),
            ));
        }
        if base_delay.is_zero() {
            return Err(CoreError::Validation(
                "retry base delay must be greater than zero".into(),
            ));
        }
        Ok(Self {
            max_attempts,
            base_delay,
            max_delay: Self::default().max_delay.max(base_delay),
            ..Self::default()
        })
    }

    /// The sleeps between attempts: one fewer than `max_attempts`.
    pub fn schedule(&self) -> Vec<Duration> {
        let mut delays = Vec::with_capacity(self.max_attempts.saturating_sub(1) as usize);
        let mut delay = self.base_delay.min(self.max_delay);
        for _ in 1..self.max_attempts.max(1) {
            delays.push(delay);
            delay = next_delay(delay, self);
        }
        delays
    }

    /// Run `op` until it succeeds or the attempts are exhausted.
    ///
    /// `op` receives the 1-based attempt number. The same input must be
    /// safe to resubmit; callers pass idempotent operations only.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut delays = self.schedule().into_iter();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < max_attempts => {
                    let delay = delays.next().unwrap_or(self.max_delay);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying",
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        error = %e,
                        "Giving up after exhausting retries",
                    );
                    return Err(RetryError {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last: e,
                    });
                }
            }
        }
    }
}
