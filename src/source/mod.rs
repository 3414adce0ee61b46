// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Read-only query interface to the inventory (spec §4.1).
//!
//! The inventory is a DNS-plugin-extended IPAM. This module speaks its
//! paginated JSON list API over `Authorization: Token <token>` and maps each
//! response into the engine's normalized [`crate::model`] types. It performs
//! no caching: every call is a fresh read.

mod dto;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::EngineError;
use crate::model::{
    normalize_replica_name, normalize_source_name, qualify_record_name, Record, RecordSet, Zone, ZoneKind,
};

/// A zone summary as returned by zone listing, before its record set has
/// been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSummary {
    pub name: String,
}

/// Read-only operations against the inventory.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// List zones whose authoritative nameserver set contains
    /// `nameserver_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SourceUnavailable`] or
    /// [`EngineError::SourceAuth`] if the inventory cannot be reached or
    /// rejects the configured credentials.
    async fn list_owned_zones(&self, nameserver_id: u64) -> Result<Vec<ZoneSummary>, EngineError>;

    /// Fetch the full zone (including rrsets) by name.
    ///
    /// Returns `Ok(None)` if the zone has vanished since it was listed —
    /// this is non-fatal, the reconciler treats it as "zone deleted".
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SourceUnavailable`] or
    /// [`EngineError::SourceAuth`] if the inventory cannot be reached or
    /// rejects the configured credentials.
    async fn get_zone_records(&self, zone_name: &str) -> Result<Option<Zone>, EngineError>;

    /// Resolve `nameserver_id` to the FQDN this engine should treat as its
    /// own identity for ownership comparisons (spec §3/§4.5). Returns
    /// `Ok(None)` if the inventory has no nameserver with that id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SourceUnavailable`] or
    /// [`EngineError::SourceAuth`] if the inventory cannot be reached or
    /// rejects the configured credentials.
    async fn get_nameserver_fqdn(&self, nameserver_id: u64) -> Result<Option<String>, EngineError>;
}

/// HTTP-backed [`SourceClient`] for the inventory's DNS-plugin API.
pub struct NetboxSourceClient {
    http: reqwest::Client,
    base_url: url::Url,
    token: String,
}

impl NetboxSourceClient {
    /// Build a client against `base_url`, authenticating with `token`.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: url::Url, token: String) -> Self {
        Self { http, base_url, token }
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, EngineError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| EngineError::SourceUnavailable(format!("bad source URL: {e}")))?;
        let resp = self
            .http
            .get(url)
            .header("Authorization", self.auth_header())
            .query(query)
            .send()
            .await
            .map_err(|e| EngineError::SourceUnavailable(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => {
                let body: T = resp
                    .json()
                    .await
                    .map_err(|e| EngineError::SourceUnavailable(format!("bad response body: {e}")))?;
                Ok(Some(body))
            }
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(EngineError::SourceAuth(format!("source rejected credentials ({})", resp.status())))
            }
            other => Err(EngineError::SourceUnavailable(format!(
                "unexpected source status {other}"
            ))),
        }
    }
}

#[async_trait]
impl SourceClient for NetboxSourceClient {
    async fn list_owned_zones(&self, nameserver_id: u64) -> Result<Vec<ZoneSummary>, EngineError> {
        let mut summaries = Vec::new();
        let mut next_path: Option<String> = Some("api/plugins/netbox-dns/zones/".to_string());
        let mut query = vec![("name_server_id".to_string(), nameserver_id.to_string())];

        while let Some(path) = next_path.take() {
            let page: Option<dto::Page<dto::SourceZoneSummary>> = self
                .get_json(
                    &path,
                    &query
                        .iter()
                        .map(|(k, v)| (k.as_str(), v.clone()))
                        .collect::<Vec<_>>(),
                )
                .await?;
            let Some(page) = page else {
                break;
            };
            summaries.extend(page.results.into_iter().map(|z| ZoneSummary {
                name: normalize_source_name(&z.name),
            }));
            next_path = page.next;
            query.clear();
        }

        debug!(count = summaries.len(), nameserver_id, "listed owned zones from source");
        Ok(summaries)
    }

    async fn get_nameserver_fqdn(&self, nameserver_id: u64) -> Result<Option<String>, EngineError> {
        let path = format!("api/plugins/netbox-dns/nameservers/{nameserver_id}/");
        let nameserver: Option<dto::SourceNameServer> = self.get_json(&path, &[]).await?;
        Ok(nameserver.map(|ns| normalize_replica_name(&ns.name)))
    }

    async fn get_zone_records(&self, zone_name: &str) -> Result<Option<Zone>, EngineError> {
        let normalized = normalize_source_name(zone_name);
        let path = "api/plugins/netbox-dns/zones/";
        let page: Option<dto::Page<dto::SourceZoneDetail>> = self
            .get_json(path, &[("name", normalized.clone())])
            .await?;
        let Some(page) = page else {
            return Ok(None);
        };
        let Some(zone_dto) = page.results.into_iter().next() else {
            return Ok(None);
        };

        let mut all_records: Vec<dto::SourceRecord> = Vec::new();
        let mut next_path: Option<String> = Some("api/plugins/netbox-dns/records/".to_string());
        let mut query = vec![("zone_id".to_string(), zone_dto.id.to_string())];
        while let Some(path) = next_path.take() {
            let records_page: Option<dto::Page<dto::SourceRecord>> = self
                .get_json(
                    &path,
                    &query
                        .iter()
                        .map(|(k, v)| (k.as_str(), v.clone()))
                        .collect::<Vec<_>>(),
                )
                .await?;
            let Some(records_page) = records_page else {
                break;
            };
            all_records.extend(records_page.results);
            next_path = records_page.next;
            query.clear();
        }

        let rrsets = group_into_rrsets(&normalized, all_records);

        Ok(Some(Zone {
            name: normalized,
            kind: ZoneKind::Native,
            nameservers: zone_dto.nameservers.unwrap_or_default(),
            soa_edit_api: "DEFAULT".to_string(),
            rrsets,
        }))
    }
}

/// Group the inventory's flat record list into `(name, type)` RRSETs,
/// qualifying short names against the zone.
fn group_into_rrsets(zone_name: &str, records: Vec<dto::SourceRecord>) -> Vec<RecordSet> {
    use std::collections::BTreeMap;

    let mut grouped: BTreeMap<(String, String), (u32, Vec<Record>)> = BTreeMap::new();
    for r in records {
        let name = qualify_record_name(&r.name, zone_name);
        let rr_type = r.rr_type.to_uppercase();
        let entry = grouped.entry((name, rr_type)).or_insert((r.ttl, Vec::new()));
        entry.0 = r.ttl;
        entry.1.push(Record { content: r.value, disabled: r.disabled });
    }

    grouped
        .into_iter()
        .map(|((name, rr_type), (ttl, records))| RecordSet {
            name,
            rr_type,
            ttl,
            records,
            comments: vec![],
        })
        .collect()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
