// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire-format DTOs for the inventory's paginated JSON API. Kept separate
//! from [`crate::model`] so a change in the inventory's schema never leaks
//! into the engine's internal representation.

use serde::Deserialize;

/// A single page of a paginated list endpoint.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    /// Absolute or relative URL of the next page, if any.
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SourceZoneSummary {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SourceNameServer {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SourceZoneDetail {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub nameservers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct SourceRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub rr_type: String,
    pub value: String,
    pub ttl: u32,
    #[serde(default)]
    pub disabled: bool,
}
