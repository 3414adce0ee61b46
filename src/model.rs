// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Normalized zone and record-set types shared by the Source Client, the
//! Replica Client, and the Diff Engine.
//!
//! These are the engine's *internal* representation — distinct from the
//! wire-format DTOs each client speaks (`source::model` / `replica::model`)
//! — so the Diff Engine never needs to know which peer a `Zone` came from.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Zone kind, normalized across the source's and replica's vocabularies.
///
/// PowerDNS's HTTP API still accepts the historical `Master`/`Slave` spelling
/// on some server versions; the Replica Client maps those onto `Primary`/
/// `Secondary` on read so the rest of the engine only ever sees one name per
/// concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneKind {
    Native,
    Primary,
    Secondary,
}

/// A single DNS record within a [`RecordSet`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Record {
    pub content: String,
    pub disabled: bool,
}

/// The set of records sharing a `(name, type)` key within a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Fully qualified, trailing-dot-normalized name, e.g. `www.example.com.`
    pub name: String,
    /// Upper-cased DNS RR type, e.g. `A`.
    pub rr_type: String,
    pub ttl: u32,
    /// Compared as an unordered multiset (see [`RecordSet::records_equal`]).
    pub records: Vec<Record>,
    /// Opaque, preserved on the replica but never authored by this engine.
    pub comments: Vec<serde_json::Value>,
}

impl RecordSet {
    /// The `(name, type)` identity of this record set within its zone.
    #[must_use]
    pub fn key(&self) -> (String, String) {
        (self.name.clone(), self.rr_type.clone())
    }

    /// Compare two record sets for equality the way the Diff Engine does:
    /// same TTL, and the same multiset of `(content, disabled)` pairs after
    /// trimming surrounding whitespace from `content`.
    #[must_use]
    pub fn records_equal(&self, other: &RecordSet) -> bool {
        if self.ttl != other.ttl {
            return false;
        }
        let normalize = |records: &[Record]| -> BTreeSet<(String, bool)> {
            records
                .iter()
                .map(|r| (r.content.trim().to_string(), r.disabled))
                .collect()
        };
        normalize(&self.records) == normalize(&other.records)
    }
}

/// A DNS zone in the engine's normalized representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Canonical name. Callers are responsible for applying the trailing-dot
    /// convention of whichever peer they are about to talk to — see
    /// [`normalize_source_name`] / [`normalize_replica_name`].
    pub name: String,
    pub kind: ZoneKind,
    /// Order-sensitive: PowerDNS treats NS order as semantic for the SOA
    /// MNAME, so this is never sorted or deduplicated by the engine.
    pub nameservers: Vec<String>,
    pub soa_edit_api: String,
    pub rrsets: Vec<RecordSet>,
}

impl Zone {
    /// Whether `nameserver_fqdn` appears in this zone's nameserver list,
    /// after lowercasing and trailing-dot normalization on both sides. This
    /// is the sole ownership marker described in spec §3/§4.5.
    #[must_use]
    pub fn is_owned_by(&self, nameserver_fqdn: &str) -> bool {
        let target = normalize_replica_name(nameserver_fqdn);
        self.nameservers
            .iter()
            .any(|ns| normalize_replica_name(ns) == target)
    }
}

/// Strip a trailing dot and lowercase, as the source side expects.
#[must_use]
pub fn normalize_source_name(name: &str) -> String {
    name.trim_end_matches('.').to_lowercase()
}

/// Ensure a trailing dot and lowercase, as the replica side expects.
#[must_use]
pub fn normalize_replica_name(name: &str) -> String {
    let lower = name.to_lowercase();
    if lower.ends_with('.') {
        lower
    } else {
        format!("{lower}.")
    }
}

/// Fully qualify a possibly-short record name against its zone, then apply
/// replica-side (trailing-dot) normalization.
#[must_use]
pub fn qualify_record_name(record_name: &str, zone_name: &str) -> String {
    let zone_fqdn = normalize_replica_name(zone_name);
    let candidate = record_name.trim();
    if candidate.is_empty() || candidate == "@" {
        return zone_fqdn;
    }
    if candidate.ends_with('.') {
        return normalize_replica_name(candidate);
    }
    normalize_replica_name(&format!("{candidate}.{}", zone_name.trim_end_matches('.')))
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod model_tests;
