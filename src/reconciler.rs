// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The Zone Reconciler: synchronizes a single zone end-to-end (spec §4.4).
//!
//! This module does **not** acquire the concurrency gate itself — callers
//! (the webhook handlers, the message-bus consumer, and the Full-Sync
//! Orchestrator) decide the gate's scope, since a full sync needs to hold it
//! across many reconciles while a single webhook-triggered reconcile needs
//! to hold it across just one.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::diff::compute_changes;
use crate::error::EngineError;
use crate::metrics;
use crate::model::{normalize_replica_name, Zone, ZoneKind};
use crate::replica::ReplicaClient;
use crate::source::SourceClient;

/// What happened to a zone as a result of a reconcile attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
    Unchanged,
    Deleted,
    /// Neither side has the zone; nothing to do.
    Skipped,
}

/// Orchestrates single-zone sync: fetch, diff, apply, create-if-missing,
/// delete-if-orphaned.
pub struct ZoneReconciler {
    source: Arc<dyn SourceClient>,
    replica: Arc<dyn ReplicaClient>,
    nameserver_fqdn: String,
    managed_types: std::collections::HashSet<String>,
}

impl ZoneReconciler {
    #[must_use]
    pub fn new(
        source: Arc<dyn SourceClient>,
        replica: Arc<dyn ReplicaClient>,
        nameserver_fqdn: String,
        managed_types: std::collections::HashSet<String>,
    ) -> Self {
        Self { source, replica, nameserver_fqdn, managed_types }
    }

    /// Synchronize `zone_name` end-to-end. See spec §4.4 for the full
    /// six-step contract.
    ///
    /// # Arguments
    ///
    /// * `zone_name` - The zone name as known to the source inventory
    ///   (un-normalized; this method normalizes it before comparing against
    ///   the replica).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SourceAuth`] or [`EngineError::ReplicaRejected`]
    /// unchanged — these abort this zone's reconcile but must not be treated
    /// as fatal to a caller reconciling many zones.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let outcome = reconciler.reconcile("example.com").await?;
    /// match outcome {
    ///     ReconcileOutcome::Created => println!("zone created on replica"),
    ///     _ => {}
    /// }
    /// ```
    #[instrument(skip(self), fields(zone = %zone_name))]
    pub async fn reconcile(&self, zone_name: &str) -> Result<ReconcileOutcome, EngineError> {
        let source_zone = self.source.get_zone_records(zone_name).await?;

        let Some(source_zone) = source_zone else {
            return self.delete_path(zone_name).await;
        };

        let replica_name = normalize_replica_name(&source_zone.name);
        let replica_zone = self.replica.get_zone(&replica_name).await?;

        let outcome = match replica_zone {
            None => {
                self.replica.create_zone(&zone_for_creation(&source_zone)).await?;
                info!(zone = %replica_name, "created zone on replica");
                metrics::record_reconcile_outcome("created");
                ReconcileOutcome::Created
            }
            Some(replica_zone) => {
                let changes = compute_changes(
                    &source_zone.rrsets,
                    &replica_zone.rrsets,
                    &self.managed_types,
                );
                if changes.is_empty() {
                    metrics::record_reconcile_outcome("unchanged");
                    ReconcileOutcome::Unchanged
                } else {
                    let change_count = changes.len();
                    self.replica.patch_zone(&replica_name, &changes).await?;
                    info!(zone = %replica_name, changes = change_count, "patched zone on replica");
                    metrics::record_reconcile_outcome("updated");
                    ReconcileOutcome::Updated
                }
            }
        };

        Ok(outcome)
    }

    /// Step 6 of the contract: the source no longer has this zone. Delete it
    /// from the replica only if the replica currently owns it.
    async fn delete_path(&self, zone_name: &str) -> Result<ReconcileOutcome, EngineError> {
        let replica_name = normalize_replica_name(zone_name);
        let Some(replica_zone) = self.replica.get_zone(&replica_name).await? else {
            metrics::record_reconcile_outcome("skipped");
            return Ok(ReconcileOutcome::Skipped);
        };

        if !zone_is_owned(&replica_zone, &self.nameserver_fqdn) {
            warn!(zone = %replica_name, "zone absent from source but not owned by us, leaving alone");
            metrics::record_reconcile_outcome("skipped");
            return Ok(ReconcileOutcome::Skipped);
        }

        self.replica.delete_zone(&replica_name).await?;
        info!(zone = %replica_name, "deleted orphaned zone from replica");
        metrics::record_reconcile_outcome("deleted");
        Ok(ReconcileOutcome::Deleted)
    }
}

/// Ownership test shared with [`crate::orchestrator`] (spec §4.5): a replica
/// zone is managed by us iff our nameserver FQDN appears in its nameserver
/// list.
///
/// # Arguments
///
/// * `zone` - The zone as currently held by the replica.
/// * `nameserver_fqdn` - The FQDN resolved for this engine's configured
///   nameserver id (see [`crate::source::SourceClient::get_nameserver_fqdn`]).
///
/// # Example
///
/// ```rust,ignore
/// if !zone_is_owned(&replica_zone, "ns1.example.com.") {
///     // leave it alone, some other system manages this zone
/// }
/// ```
#[must_use]
pub fn zone_is_owned(zone: &Zone, nameserver_fqdn: &str) -> bool {
    zone.is_owned_by(nameserver_fqdn)
}

/// Build the zone the Replica Client should create when a source zone has
/// no replica counterpart yet (spec §4.4 step 4).
///
/// # Arguments
///
/// * `source_zone` - The zone as returned by the Source Client, with its
///   name still in source form (not yet normalized for the replica).
///
/// # Example
///
/// ```rust,ignore
/// let zone = zone_for_creation(&source_zone);
/// replica.create_zone(&zone).await?;
/// ```
#[must_use]
pub fn zone_for_creation(source_zone: &Zone) -> Zone {
    Zone {
        name: normalize_replica_name(&source_zone.name),
        kind: ZoneKind::Native,
        nameservers: source_zone.nameservers.clone(),
        soa_edit_api: "DEFAULT".to_string(),
        rrsets: source_zone.rrsets.clone(),
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
