// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The Full-Sync Orchestrator: reconciles every owned zone and prunes
//! orphaned replica zones in one pass (spec §4.5).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument, warn};

use crate::error::EngineError;
use crate::gate::ConcurrencyGate;
use crate::metrics;
use crate::model::normalize_replica_name;
use crate::reconciler::{ReconcileOutcome, ZoneReconciler};
use crate::replica::ReplicaClient;
use crate::source::SourceClient;

/// Aggregate result of one full-sync pass.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub reconciled: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub pruned: usize,
}

/// Enumerates owned zones from the source, reconciles each against the
/// replica, then deletes any replica zone we own that the source no longer
/// lists.
pub struct FullSyncOrchestrator {
    source: Arc<dyn SourceClient>,
    replica: Arc<dyn ReplicaClient>,
    reconciler: Arc<ZoneReconciler>,
    gate: ConcurrencyGate,
    nameserver_id: u64,
    nameserver_fqdn: String,
}

impl FullSyncOrchestrator {
    #[must_use]
    pub fn new(
        source: Arc<dyn SourceClient>,
        replica: Arc<dyn ReplicaClient>,
        reconciler: Arc<ZoneReconciler>,
        gate: ConcurrencyGate,
        nameserver_id: u64,
        nameserver_fqdn: String,
    ) -> Self {
        Self { source, replica, reconciler, gate, nameserver_id, nameserver_fqdn }
    }

    /// Run a full sync, holding the concurrency gate for its entire
    /// duration so no webhook- or bus-triggered reconcile can interleave.
    ///
    /// # Arguments
    ///
    /// * `trigger` - Labels the caller (`"schedule"`, `"webhook"`, ...) for
    ///   metrics and logs.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GateTimeout`] if the gate cannot be acquired.
    /// A failure to list owned zones from the source is recorded in the
    /// returned [`SyncSummary`] rather than surfaced as an `Err`, except
    /// that it aborts the run before any pruning decision is made.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let summary = orchestrator.full_sync("schedule").await?;
    /// info!(pruned = summary.pruned, "sync done");
    /// ```
    #[instrument(skip(self), fields(trigger = trigger))]
    pub async fn full_sync(&self, trigger: &str) -> Result<SyncSummary, EngineError> {
        let guard = self.gate.acquire("full_sync", crate::gate::DEFAULT_ACQUIRE_TIMEOUT).await?;
        let started = Instant::now();

        let result = self.run_locked(trigger).await;
        drop(guard);

        match &result {
            Ok(summary) => {
                metrics::record_sync(trigger, "completed", started.elapsed());
                info!(
                    trigger,
                    reconciled = summary.reconciled,
                    pruned = summary.pruned,
                    failed = summary.failed,
                    elapsed = ?started.elapsed(),
                    "full sync completed"
                );
            }
            Err(e) => {
                metrics::record_sync(trigger, "source_unavailable", started.elapsed());
                error!(trigger, error = %e, "full sync aborted");
            }
        }
        result
    }

    async fn run_locked(&self, trigger: &str) -> Result<SyncSummary, EngineError> {
        let owned = self.source.list_owned_zones(self.nameserver_id).await?;
        let owned_names: HashSet<String> = owned
            .iter()
            .map(|z| normalize_replica_name(&z.name))
            .collect();

        let mut summary = SyncSummary::default();
        for zone in &owned {
            summary.reconciled += 1;
            match self.reconciler.reconcile(&zone.name).await {
                Ok(ReconcileOutcome::Created) => summary.created += 1,
                Ok(ReconcileOutcome::Updated) => summary.updated += 1,
                Ok(ReconcileOutcome::Unchanged | ReconcileOutcome::Skipped | ReconcileOutcome::Deleted) => {
                    summary.unchanged += 1;
                }
                Err(e) => {
                    warn!(zone = %zone.name, trigger, error = %e, "zone reconcile failed during full sync");
                    summary.failed += 1;
                }
            }
        }

        // Conservative pruning: only reachable because list_owned_zones
        // above succeeded; an unreachable source must never look like
        // "this zone is no longer owned".
        let replica_all = self.replica.list_zones().await?;
        for replica_zone in &replica_all {
            let name = normalize_replica_name(&replica_zone.name);
            if owned_names.contains(&name) {
                continue;
            }
            if !is_owned_by(&replica_zone.nameservers, &self.nameserver_fqdn) {
                continue;
            }
            match self.replica.delete_zone(&name).await {
                Ok(()) => {
                    info!(zone = %name, "pruned orphaned zone");
                    summary.pruned += 1;
                }
                Err(e) => {
                    warn!(zone = %name, error = %e, "failed to prune orphaned zone");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// Ownership test shared with [`crate::reconciler`] (spec §4.5): a replica
/// zone is managed by us iff our nameserver FQDN appears in its nameserver
/// list, compared after trailing-dot/case normalization.
fn is_owned_by(nameservers: &[String], nameserver_fqdn: &str) -> bool {
    let target = normalize_replica_name(nameserver_fqdn);
    nameservers.iter().any(|ns| normalize_replica_name(ns) == target)
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod orchestrator_tests;
