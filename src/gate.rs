// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The Concurrency Gate: a single serialization lock around every replica
//! mutation, with instrumented acquisition (spec §4.6).
//!
//! Expressed as an RAII guard rather than a manual lock/unlock pair so every
//! exit path — including early returns and panics unwinding through a task —
//! releases the gate.

use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, warn};

use crate::error::EngineError;
use crate::metrics;

/// Log a WARNING if gate acquisition waits longer than this.
const CONTENTION_WARNING_THRESHOLD: Duration = Duration::from_secs(1);

/// Default acquisition timeout (spec §4.6 / §5).
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// The process-wide serialization primitive. No other component may lock it
/// directly — all access goes through [`ConcurrencyGate::acquire`].
#[derive(Clone)]
pub struct ConcurrencyGate {
    inner: std::sync::Arc<Mutex<()>>,
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ConcurrencyGate {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: std::sync::Arc::new(Mutex::new(())) }
    }

    /// Acquire the gate for `operation_name`, waiting up to `timeout`.
    ///
    /// # Arguments
    ///
    /// * `operation_name` - Label attached to logs and the gate-wait metric
    ///   (`"full_sync"`, `"webhook_reconcile"`, ...).
    /// * `timeout` - Maximum time to wait before giving up.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GateTimeout`] if the gate is not acquired
    /// within `timeout`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let guard = gate.acquire("webhook_reconcile", DEFAULT_ACQUIRE_TIMEOUT).await?;
    /// // guard released on drop
    /// ```
    pub async fn acquire(
        &self,
        operation_name: &str,
        timeout: Duration,
    ) -> Result<GateGuard, EngineError> {
        let wait_start = Instant::now();
        let guard = tokio::time::timeout(timeout, self.inner.clone().lock_owned()).await;

        match guard {
            Ok(guard) => {
                let waited = wait_start.elapsed();
                metrics::record_gate_wait(operation_name, waited);
                if waited > CONTENTION_WARNING_THRESHOLD {
                    warn!(
                        operation = operation_name,
                        waited = ?waited,
                        "gate acquisition contended"
                    );
                } else {
                    debug!(operation = operation_name, waited = ?waited, "gate acquired");
                }
                Ok(GateGuard {
                    _guard: guard,
                    operation_name: operation_name.to_string(),
                    acquired_at: Instant::now(),
                })
            }
            Err(_) => {
                metrics::record_gate_wait(operation_name, wait_start.elapsed());
                error!(operation = operation_name, timeout = ?timeout, "gate acquisition timed out");
                Err(EngineError::GateTimeout { operation: operation_name.to_string() })
            }
        }
    }
}

/// RAII guard returned by [`ConcurrencyGate::acquire`]. Releasing (dropping)
/// logs the hold duration at `DEBUG`.
#[derive(Debug)]
pub struct GateGuard {
    _guard: OwnedMutexGuard<()>,
    operation_name: String,
    acquired_at: Instant,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        debug!(
            operation = %self.operation_name,
            held = ?self.acquired_at.elapsed(),
            "gate released"
        );
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod gate_tests;
