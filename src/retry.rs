// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff and jitter for replica API calls.
//!
//! The source's Python implementation expresses retry as a decorator wrapping
//! instance methods; here it is a single [`retry_with_backoff`] helper driven
//! by a [`RetryPolicy`] value, called from the Replica Client instead of
//! duplicated per request.

use std::time::{Duration, Instant};

use rand::RngExt;
use tracing::{debug, error, warn};

/// Parameters controlling how a retryable operation backs off between
/// attempts. Matches spec §4.2: `base_delay * backoff_factor^(n-1) *
/// uniform(0.5, 1.0)`, capped at `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to use before attempt `n` (1-indexed, `n >= 2`).
    fn delay_for_attempt(&self, n: u32) -> Duration {
        let exp = self.backoff_factor.powi((n - 1) as i32);
        let uncapped = self.base_delay.mul_f64(exp);
        let capped = uncapped.min(self.max_delay);
        let jitter = rand::rng().random_range(0.5..=1.0);
        capped.mul_f64(jitter)
    }
}

/// Outcome an operation reports back to [`retry_with_backoff`] so it can
/// decide whether to retry.
pub enum Attempt<T, E> {
    /// The operation succeeded.
    Ok(T),
    /// The operation failed in a way that should be retried.
    Retryable(E),
    /// The operation failed permanently; stop immediately.
    Fatal(E),
}

/// Run `operation` under `policy`, retrying [`Attempt::Retryable`] failures
/// with exponential backoff and jitter up to `policy.max_attempts` times.
///
/// Every attempt is logged at `WARN` with the attempt number and computed
/// delay; a terminal failure (attempts exhausted or a `Fatal` outcome) is
/// logged at `ERROR`.
pub async fn retry_with_backoff<T, E, F, Fut>(
    operation_name: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Attempt<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match operation().await {
            Attempt::Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt,
                        elapsed = ?start.elapsed(),
                        "call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Attempt::Fatal(err) => {
                error!(operation = operation_name, attempt, error = %err, "non-retryable error");
                return Err(err);
            }
            Attempt::Retryable(err) => {
                if attempt >= policy.max_attempts {
                    error!(
                        operation = operation_name,
                        attempt,
                        elapsed = ?start.elapsed(),
                        error = %err,
                        "retries exhausted"
                    );
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt + 1);
                warn!(
                    operation = operation_name,
                    attempt,
                    retry_after = ?delay,
                    error = %err,
                    "retryable error, will retry"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Whether an HTTP status code should be treated as transient (spec §4.2):
/// any 5xx, or 429 (rate limiting at the peer).
#[must_use]
pub fn is_retryable_http_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
