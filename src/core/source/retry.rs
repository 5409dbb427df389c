//! Bounded retry with exponential backoff for source fetches.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::SourceError;

/// Retry behavior for fetch and refresh calls.
///
/// Only transient failures (see [`SourceError::is_transient`]) are retried;
/// authentication and missing-branch errors fail immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            factor: 1.0,
        }
    }

    /// Run `operation`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts are exhausted, or the first
    /// non-transient error.
    pub fn run<T, F>(&self, operation_name: &str, mut operation: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Result<T, SourceError>,
    {
        let mut delay = self.initial_delay;
        let mut attempts = 0;

        loop {
            match operation() {
                Ok(val) => {
                    if attempts > 0 {
                        info!(operation = operation_name, retries = attempts, "succeeded after retry");
                    }
                    return Ok(val);
                }
                Err(err) => {
                    attempts += 1;
                    if !err.is_transient() || attempts >= self.max_attempts.max(1) {
                        return Err(err);
                    }

                    warn!(
                        operation = operation_name,
                        attempt = attempts,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "retrying in {:?}",
                        delay
                    );

                    std::thread::sleep(delay);
                    delay = delay.mul_f64(self.factor).min(self.max_delay);
                }
            }
        }
    }
}
