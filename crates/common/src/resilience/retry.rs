//! Generic sequential retry with exponential backoff.
//!
//! The executor runs an async operation up to `max_retries + 1` times,
//! strictly sequentially, sleeping before each retry. It stops on the
//! first success and reports how many attempts were actually made, so
//! callers can surface the count in their own results.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced when a retry configuration is invalid.
#[derive(Debug, Error)]
pub enum RetryConfigError {
    #[error("Invalid retry configuration: {message}")]
    Invalid { message: String },
}

/// Configuration for retry behavior.
///
/// The delay before attempt `n` (`n >= 1`, zero-based) is
/// `min(initial_delay * backoff_multiplier^n, max_delay)`; attempt 0
/// runs immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Number of retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay fed into the backoff curve.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Exponential growth factor applied per attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A degenerate configuration that makes exactly one attempt.
    ///
    /// Used by deferred background tasks that arm their own timer and
    /// only want the executor's attempt accounting.
    pub const fn one_shot() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if self.backoff_multiplier <= 0.0 {
            return Err(RetryConfigError::Invalid {
                message: "backoff_multiplier must be greater than 0".to_string(),
            });
        }
        if self.max_delay < self.initial_delay && self.max_retries > 0 {
            return Err(RetryConfigError::Invalid {
                message: "max_delay must not be smaller than initial_delay".to_string(),
            });
        }
        Ok(())
    }

    /// Delay before the given zero-based attempt (`attempt >= 1`).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = raw.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Outcome of a retry execution: the terminal result plus how many
/// attempts were actually made (never more than `max_retries + 1`).
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl<T, E> RetryOutcome<T, E> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }

    /// Whether the operation eventually succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Execute `operation` with sequential retry and exponential backoff.
///
/// Attempts never overlap; the executor sleeps between them. On success
/// the outcome carries the value and the number of attempts made; on
/// exhaustion it carries the last error and `max_retries + 1`.
pub async fn run_with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Debug,
{
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt);
            warn!(attempt, ?delay, "operation failed, retrying after delay");
            tokio::time::sleep(delay).await;
        }

        debug!(attempt = attempt + 1, total = config.max_retries + 1, "executing operation");

        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(retries = attempt, "operation succeeded after retries");
                }
                return RetryOutcome { result: Ok(value), attempts: attempt + 1 };
            }
            Err(error) => {
                if attempt >= config.max_retries {
                    warn!(attempts = attempt + 1, error = ?error, "all retry attempts exhausted");
                    return RetryOutcome { result: Err(error), attempts: attempt + 1 };
                }
                debug!(attempt = attempt + 1, error = ?error, "attempt failed");
            }
        }

        attempt += 1;
    }
}
