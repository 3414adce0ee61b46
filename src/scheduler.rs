// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The Periodic Scheduler: fires full-sync triggers on a cron schedule
//! (spec §4.7).
//!
//! Computes the next fire time from the cron expression and sleeps until it
//! elapses, rather than polling on a fixed tick, so drift stays bounded
//! across long uptimes.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tracing::{error, info, warn};

use crate::error::EngineError;
use crate::orchestrator::FullSyncOrchestrator;
use crate::state::ApplicationState;

/// Background cron-driven full-sync trigger.
pub struct PeriodicScheduler {
    schedule: Schedule,
    orchestrator: Arc<FullSyncOrchestrator>,
    state: Arc<ApplicationState>,
}

impl std::fmt::Debug for PeriodicScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicScheduler").finish_non_exhaustive()
    }
}

impl PeriodicScheduler {
    /// Parse `crontab` (a 5-field expression) and build a scheduler bound to
    /// `orchestrator`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigInvalid`] if the expression does not
    /// parse. [`crate::config::Config::from_env`] validates this same
    /// expression at startup, so this should not fail in practice by the
    /// time a scheduler is constructed.
    pub fn new(
        crontab: &str,
        orchestrator: Arc<FullSyncOrchestrator>,
        state: Arc<ApplicationState>,
    ) -> Result<Self, EngineError> {
        let six_field = format!("0 {crontab}");
        let schedule = Schedule::from_str(&six_field)
            .map_err(|e| EngineError::ConfigInvalid(format!("invalid cron expression: {e}")))?;
        Ok(Self { schedule, orchestrator, state })
    }

    /// Run forever, sleeping until each scheduled fire time and then
    /// triggering a full sync. Exits when `shutdown` resolves.
    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        self.state.set_scheduler_running(true);
        info!("periodic scheduler started");

        loop {
            let Some(next) = self.schedule.upcoming(Utc).next() else {
                error!("cron schedule has no upcoming fire times, stopping scheduler");
                break;
            };
            let now = Utc::now();
            let wait = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);

            tokio::select! {
                () = tokio::time::sleep(wait) => {
                    self.fire().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("periodic scheduler shutting down");
                        break;
                    }
                }
            }
        }

        self.state.set_scheduler_running(false);
    }

    async fn fire(&self) {
        match self.orchestrator.full_sync("schedule").await {
            Ok(summary) => {
                info!(
                    reconciled = summary.reconciled,
                    pruned = summary.pruned,
                    failed = summary.failed,
                    "scheduled full sync completed"
                );
            }
            Err(EngineError::GateTimeout { .. }) => {
                warn!("scheduled full sync skipped: previous run still holds the concurrency gate");
            }
            Err(e) => {
                error!(error = %e, "scheduled full sync failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod scheduler_tests;
