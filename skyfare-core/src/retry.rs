//! Retry with exponential backoff.
//!
//! Shared by the pricing provider client and chat delivery: both retry the
//! same way, only the attempt ceiling and base delay differ.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failure; doubled after each further failure.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// Backoff after the failed attempt number `attempt` (zero based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        self.base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }
}

pub trait RetryableError {
    fn is_retryable(&self) -> bool;

    /// Minimum wait the remote side asked for before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt ceiling is reached. The last error is returned.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if !err.is_retryable() || attempt >= config.max_attempts {
                    return Err(err);
                }

                let backoff = config.delay_for_attempt(attempt - 1);
                let delay = err.retry_after().map_or(backoff, |floor| backoff.max(floor));
                warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient error"
                );
                sleep(delay).await;
            }
        }
    }
}
