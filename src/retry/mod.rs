//! Retry Executor - bounded retries with deterministic exponential backoff.
//!
//! The executor is agnostic to *why* an operation failed. Callers decide
//! what is worth retrying; in this crate that means only errors classified
//! as [`ErrorCode::Transient`](crate::ErrorCode::Transient).
//!
//! No jitter is applied. Callers that need jitter add it around the executor.
//!
//! ## Example
//!
//! ```ignore
//! let executor = RetryExecutor::new(RetryPolicy::default());
//! let token = CancellationToken::with_timeout(Duration::from_secs(2));
//!
//! let country = executor.run(&token, || repo.get(&id).and_then(transient_only))?;
//! ```

mod cancel;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::duration_ms;

pub use cancel::{CancellationToken, Cancelled};

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a policy from its four knobs.
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_factor: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_factor,
        }
    }

    /// Set the total number of attempts, including the first.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the wait before the second attempt.
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Set the cap on any single wait.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the multiplier applied to the delay after each attempt.
    pub fn with_backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based):
    /// `min(initial_delay * backoff_factor^(attempt - 1), max_delay)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let nanos = self.initial_delay.as_nanos() as f64 * self.backoff_factor.powi(exponent);

        if nanos.is_nan() || nanos <= 0.0 {
            return Duration::ZERO;
        }
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(nanos.round() as u64)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Failure of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The caller's token fired while waiting between attempts.
    #[error("retry interrupted: {0}")]
    Cancelled(Cancelled),
    /// Every attempt failed; `last` is the final attempt's error.
    #[error("operation failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// Whether the retry loop stopped on cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled(_))
    }

    /// The error of the final attempt, if one was made.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Cancelled(_) => None,
        }
    }

    /// Consume the error, returning the final attempt's error.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Cancelled(_) => None,
        }
    }
}

/// Runs operations under a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor with the given policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Get a reference to the policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke `op` until it succeeds or the attempts run out.
    ///
    /// Suspension only happens between attempts and goes through `token`, so
    /// cancelling (or hitting the token's deadline) during a wait returns
    /// [`RetryError::Cancelled`] without any further attempt.
    pub fn run<T, E, F>(&self, token: &CancellationToken, mut op: F) -> Result<T, RetryError<E>>
    where
        E: fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let max_attempts = self.policy.attempts();
        let mut attempt = 1;

        loop {
            match op() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt >= max_attempts => {
                    warn!(attempts = attempt, error = %err, "retry attempts exhausted");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => {
                    let delay = self.policy.delay_for(attempt);
                    debug!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "attempt failed, backing off"
                    );
                    token.sleep(delay).map_err(RetryError::Cancelled)?;
                    attempt += 1;
                }
            }
        }
    }
}

/// One-shot form of [`RetryExecutor::run`].
pub fn execute_with_retry<T, E, F>(
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    token: &CancellationToken,
    op: F,
) -> Result<T, RetryError<E>>
where
    E: fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    RetryExecutor::new(RetryPolicy::new(
        max_attempts,
        initial_delay,
        max_delay,
        backoff_factor,
    ))
    .run(token, op)
}
