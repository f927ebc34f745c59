//! Timeouts and bounded retry with exponential backoff for remote calls.
//!
//! Every adapter that talks to an external service (embedding, vector index,
//! chat completion) wraps each request in [`RetryPolicy::run`]. Only errors
//! that report themselves as transient are retried; structural failures are
//! returned on the first attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{CompletionError, EmbedError, StoreError};

/// Errors that can be classified for retrying.
pub trait Retryable {
    /// Whether another attempt may succeed.
    fn is_transient(&self) -> bool;

    /// Error to report when an attempt exceeds its timeout.
    fn timed_out(after: Duration) -> Self;
}

impl Retryable for EmbedError {
    fn is_transient(&self) -> bool {
        EmbedError::is_transient(self)
    }

    fn timed_out(after: Duration) -> Self {
        EmbedError::Timeout(after)
    }
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        StoreError::is_transient(self)
    }

    fn timed_out(after: Duration) -> Self {
        StoreError::Timeout(after)
    }
}

impl Retryable for CompletionError {
    fn is_transient(&self) -> bool {
        CompletionError::is_transient(self)
    }

    fn timed_out(after: Duration) -> Self {
        CompletionError::Timeout(after)
    }
}

/// Per-call timeout and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: usize,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Timeout applied to each attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(16),
            timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            timeout,
            ..Self::default()
        }
    }

    /// Delay after the given failed attempt (1-indexed).
    #[must_use]
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or the budget is spent.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(self.timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation, attempt, max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
