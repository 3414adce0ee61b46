// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The Diff Engine: a pure function computing the minimal set of RRSET
//! changes to converge a replica zone toward a source zone (spec §4.3).

use std::collections::{HashMap, HashSet};

use crate::model::RecordSet;

/// A single change to apply to the replica via `PATCH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RrsetChange {
    /// Upsert: create or overwrite the `(name, type)` record set with new
    /// values and TTL.
    Replace(RecordSet),
    /// Remove the `(name, type)` record set entirely.
    Delete { name: String, rr_type: String },
}

/// Compute the ordered sequence of changes needed to converge `replica_rrsets`
/// toward `source_rrsets`, restricted to `managed_types`.
///
/// Record sets whose type is outside `managed_types` are never inspected or
/// emitted — they are the replica's to own.
#[must_use]
pub fn compute_changes(
    source_rrsets: &[RecordSet],
    replica_rrsets: &[RecordSet],
    managed_types: &HashSet<String>,
) -> Vec<RrsetChange> {
    let replica_by_key: HashMap<(String, String), &RecordSet> = replica_rrsets
        .iter()
        .map(|rrset| (rrset.key(), rrset))
        .collect();

    let mut changes = Vec::new();

    // Step 1: REPLACE anything in source that's missing or stale on replica.
    for source_rrset in source_rrsets {
        if !managed_types.contains(&source_rrset.rr_type) {
            continue;
        }
        match replica_by_key.get(&source_rrset.key()) {
            None => changes.push(RrsetChange::Replace(source_rrset.clone())),
            Some(replica_rrset) => {
                if !source_rrset.records_equal(replica_rrset) {
                    changes.push(RrsetChange::Replace(source_rrset.clone()));
                }
            }
        }
    }

    // Step 2: DELETE anything managed on replica that source no longer has.
    let source_keys: HashSet<(String, String)> =
        source_rrsets.iter().map(RecordSet::key).collect();
    for replica_rrset in replica_rrsets {
        if !managed_types.contains(&replica_rrset.rr_type) {
            continue;
        }
        if !source_keys.contains(&replica_rrset.key()) {
            changes.push(RrsetChange::Delete {
                name: replica_rrset.name.clone(),
                rr_type: replica_rrset.rr_type.clone(),
            });
        }
    }

    changes
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
