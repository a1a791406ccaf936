//! Exponential backoff policy for broker connection failures.
//!
//! Delays grow as `base * multiplier^(attempt-1)`, capped at the configured
//! command timeout: with the defaults that is 1s, 2s, 4s, 8s and so on.
//! The attempt budget bounds setup retries; receive loops keep running at
//! the capped delay and escalate through the error path instead of halting.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{BrokerConfig, ConnectionRetryConfig};

/// Backoff schedule plus attempt budget for connection-level retries
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, multiplier: f64, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            multiplier,
            max_attempts,
        }
    }

    /// Build the policy from configuration; the command timeout caps every
    /// delay
    pub fn from_config(retry: &ConnectionRetryConfig, broker: &BrokerConfig) -> Self {
        Self::new(
            retry.base_delay(),
            broker.command_timeout(),
            retry.backoff_multiplier,
            retry.max_attempts,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether the attempt budget is spent; callers escalate via the error
    /// path rather than stopping
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    /// Delay before the given attempt, 1-based. Attempt 1 waits the base
    /// delay; each further attempt multiplies, capped at the max delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_seconds = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = delay_seconds.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Run an async operation with bounded retries, sleeping the backoff
    /// delay between attempts. Returns the last error once the attempt
    /// budget is spent.
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use relay_core::resilience::RetryPolicy;
    ///
    /// # tokio_test::block_on(async {
    /// let policy = RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(8), 2.0, 3);
    /// let result: Result<&str, String> = policy
    ///     .execute_with_retry("readiness_probe", || async { Ok("ready") })
    ///     .await;
    /// assert_eq!(result, Ok("ready"));
    /// # });
    /// ```
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            operation = %operation_name,
                            attempt = attempt,
                            "🔄 Operation recovered after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if attempt < self.max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        operation = %operation_name,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "🔄 Retrying after connection failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "💥 Retry budget exhausted"
                    );
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        use crate::constants::limits;
        Self::new(
            Duration::from_secs(limits::CONNECTION_RETRY_BASE_SECONDS),
            Duration::from_secs(limits::DEFAULT_COMMAND_TIMEOUT_SECONDS),
            2.0,
            limits::DEFAULT_MAX_CONNECTION_ATTEMPTS,
        )
    }
}
