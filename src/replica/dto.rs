// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire-format DTOs for the PowerDNS Authoritative HTTP API v1.
//!
//! Field set and naming follow the upstream API documentation (and the
//! `galenguyer/powerdns` crate's treatment of it): a `Zone` carries optional
//! `rrsets` (populated on a single-zone `GET`, omitted on the zone-list
//! endpoint), and a patch body distinguishes `REPLACE` from `DELETE` via
//! `changetype` on each RRSet.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdnsZone {
    pub name: String,
    #[serde(rename = "kind")]
    pub kind: PdnsZoneKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rrsets: Option<Vec<PdnsRrset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nameservers: Option<Vec<String>>,
    #[serde(rename = "soa_edit_api", default, skip_serializing_if = "Option::is_none")]
    pub soa_edit_api: Option<String>,
}

/// PowerDNS accepts both the modern (`Native`/`Primary`/`Secondary`) and
/// historical (`Master`/`Slave`) spellings on some server versions; both
/// deserialize, but the engine only ever serializes the modern spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdnsZoneKind {
    Native,
    Primary,
    Secondary,
    #[serde(rename = "Master")]
    MasterAlias,
    #[serde(rename = "Slave")]
    SlaveAlias,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdnsRrset {
    pub name: String,
    #[serde(rename = "type")]
    pub rr_type: String,
    pub ttl: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changetype: Option<String>,
    pub records: Vec<PdnsRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdnsRecord {
    pub content: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct PdnsError {
    #[serde(default)]
    pub error: String,
}
