// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Replica Client: all PowerDNS Authoritative HTTP API interactions
//! (spec §4.2), with per-call exponential-backoff retry and
//! conflict-tolerant `create_zone` semantics.

mod dto;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::warn;

use crate::diff::RrsetChange;
use crate::error::EngineError;
use crate::metrics;
use crate::model::{normalize_replica_name, Record, RecordSet, Zone, ZoneKind};
use crate::retry::{is_retryable_http_status, retry_with_backoff, Attempt, RetryPolicy};
use dto::{PdnsRecord, PdnsRrset, PdnsZone, PdnsZoneKind};

/// A zone summary as returned by the zone-list endpoint (name and kind only,
/// per spec §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaZoneSummary {
    pub name: String,
    pub nameservers: Vec<String>,
}

/// Read/create/patch/delete interface to the PowerDNS-compatible API.
#[async_trait]
pub trait ReplicaClient: Send + Sync {
    /// Fetch a zone by name. Returns `Ok(None)` if the replica has no such
    /// zone.
    async fn get_zone(&self, name: &str) -> Result<Option<Zone>, EngineError>;

    /// List every zone the replica currently serves, name and nameservers
    /// only (no rrsets).
    async fn list_zones(&self) -> Result<Vec<ReplicaZoneSummary>, EngineError>;

    /// Create `zone` on the replica. A 409 conflict (zone already exists)
    /// is treated as success rather than an error — see the
    /// [`PdnsReplicaClient::create_zone`] implementation.
    async fn create_zone(&self, zone: &Zone) -> Result<(), EngineError>;

    /// Apply `changes` to the named zone. A no-op if `changes` is empty.
    async fn patch_zone(&self, name: &str, changes: &[RrsetChange]) -> Result<(), EngineError>;

    /// Delete the named zone from the replica.
    async fn delete_zone(&self, name: &str) -> Result<(), EngineError>;
}

/// HTTP-backed [`ReplicaClient`] for the PowerDNS Authoritative API.
pub struct PdnsReplicaClient {
    http: reqwest::Client,
    base_url: url::Url,
    server_id: String,
    token: String,
    retry_policy: RetryPolicy,
}

impl PdnsReplicaClient {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: url::Url, server_id: String, token: String) -> Self {
        Self {
            http,
            base_url,
            server_id,
            token,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Override the retry policy (primarily for tests that want fast
    /// backoff instead of the 1s/2s/4s production schedule).
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn zone_url(&self, name: &str) -> Result<url::Url, EngineError> {
        let qualified = normalize_replica_name(name);
        self.base_url
            .join(&format!(
                "api/v1/servers/{}/zones/{qualified}",
                self.server_id
            ))
            .map_err(|e| EngineError::ReplicaUnavailable(format!("bad replica URL: {e}")))
    }

    fn zones_collection_url(&self) -> Result<url::Url, EngineError> {
        self.base_url
            .join(&format!("api/v1/servers/{}/zones", self.server_id))
            .map_err(|e| EngineError::ReplicaUnavailable(format!("bad replica URL: {e}")))
    }

    /// Execute a single HTTP request, classifying the outcome into an
    /// [`Attempt`] so [`retry_with_backoff`] knows whether to retry.
    async fn send(
        &self,
        operation: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Attempt<reqwest::Response, EngineError> {
        match build().header("X-API-Key", &self.token).send().await {
            Ok(resp) if resp.status().is_success() => Attempt::Ok(resp),
            Ok(resp) if is_retryable_http_status(resp.status()) => {
                metrics::record_replica_call(operation, "retried");
                Attempt::Retryable(EngineError::ReplicaUnavailable(format!(
                    "replica returned {}",
                    resp.status()
                )))
            }
            Ok(resp) => Attempt::Fatal(EngineError::ReplicaRejected(format!(
                "replica returned {}",
                resp.status()
            ))),
            Err(e) => {
                metrics::record_replica_call(operation, "retried");
                Attempt::Retryable(EngineError::ReplicaUnavailable(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl ReplicaClient for PdnsReplicaClient {
    async fn get_zone(&self, name: &str) -> Result<Option<Zone>, EngineError> {
        let url = self.zone_url(name)?;
        let http = self.http.clone();
        let resp = retry_with_backoff("get_zone", self.retry_policy, || {
            let url = url.clone();
            let http = http.clone();
            let token = self.token.clone();
            async move {
                match http.get(url).header("X-API-Key", token).send().await {
                    Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                        Attempt::Fatal(EngineError::SourceNotFound(name.to_string()))
                    }
                    Ok(resp) if resp.status().is_success() => Attempt::Ok(Some(resp)),
                    Ok(resp) if is_retryable_http_status(resp.status()) => {
                        metrics::record_replica_call("get_zone", "retried");
                        Attempt::Retryable(EngineError::ReplicaUnavailable(format!(
                            "replica returned {}",
                            resp.status()
                        )))
                    }
                    Ok(resp) => Attempt::Fatal(EngineError::ReplicaRejected(format!(
                        "replica returned {}",
                        resp.status()
                    ))),
                    Err(e) => {
                        metrics::record_replica_call("get_zone", "retried");
                        Attempt::Retryable(EngineError::ReplicaUnavailable(e.to_string()))
                    }
                }
            }
        })
        .await;

        let resp = match resp {
            Ok(resp) => {
                metrics::record_replica_call("get_zone", "ok");
                resp
            }
            Err(EngineError::SourceNotFound(_)) => {
                metrics::record_replica_call("get_zone", "not_found");
                return Ok(None);
            }
            Err(e) => {
                metrics::record_replica_call("get_zone", "failed");
                return Err(e);
            }
        };
        let Some(resp) = resp else { return Ok(None) };

        let dto: PdnsZone = resp
            .json()
            .await
            .map_err(|e| EngineError::ReplicaUnavailable(format!("bad response body: {e}")))?;
        Ok(Some(from_dto(dto)))
    }

    async fn list_zones(&self) -> Result<Vec<ReplicaZoneSummary>, EngineError> {
        let url = self.zones_collection_url()?;
        let http = self.http.clone();
        let resp = retry_with_backoff("list_zones", self.retry_policy, || {
            let http = http.clone();
            let url = url.clone();
            async move { self.send("list_zones", || http.get(url.clone())).await }
        })
        .await;
        let resp = match resp {
            Ok(resp) => {
                metrics::record_replica_call("list_zones", "ok");
                resp
            }
            Err(e) => {
                metrics::record_replica_call("list_zones", "failed");
                return Err(e);
            }
        };

        let dtos: Vec<PdnsZone> = resp
            .json()
            .await
            .map_err(|e| EngineError::ReplicaUnavailable(format!("bad response body: {e}")))?;
        Ok(dtos
            .into_iter()
            .map(|z| ReplicaZoneSummary {
                name: normalize_replica_name(&z.name),
                nameservers: z.nameservers.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_zone(&self, zone: &Zone) -> Result<(), EngineError> {
        let url = self.zones_collection_url()?;
        let body = to_create_dto(zone);
        let http = self.http.clone();
        let name = zone.name.clone();
        let result = retry_with_backoff("create_zone", self.retry_policy, || {
            let http = http.clone();
            let url = url.clone();
            let body = body.clone();
            let name = name.clone();
            async move {
                match http
                    .post(url)
                    .header("X-API-Key", &self.token)
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(resp) if resp.status() == StatusCode::CONFLICT => {
                        Attempt::Fatal(EngineError::ReplicaConflict(name.clone()))
                    }
                    Ok(resp) if resp.status().is_success() => Attempt::Ok(()),
                    Ok(resp) if is_retryable_http_status(resp.status()) => {
                        metrics::record_replica_call("create_zone", "retried");
                        Attempt::Retryable(EngineError::ReplicaUnavailable(format!(
                            "replica returned {}",
                            resp.status()
                        )))
                    }
                    Ok(resp) => Attempt::Fatal(EngineError::ReplicaRejected(format!(
                        "replica returned {}",
                        resp.status()
                    ))),
                    Err(e) => {
                        metrics::record_replica_call("create_zone", "retried");
                        Attempt::Retryable(EngineError::ReplicaUnavailable(e.to_string()))
                    }
                }
            }
        })
        .await;

        match result {
            Ok(()) => {
                metrics::record_replica_call("create_zone", "ok");
                Ok(())
            }
            Err(EngineError::ReplicaConflict(name)) => {
                metrics::record_replica_call("create_zone", "ok");
                warn!(zone = %name, "create_zone conflicted with an existing zone, treating as success");
                Ok(())
            }
            Err(e) => {
                metrics::record_replica_call("create_zone", "failed");
                Err(e)
            }
        }
    }

    async fn patch_zone(&self, name: &str, changes: &[RrsetChange]) -> Result<(), EngineError> {
        if changes.is_empty() {
            return Ok(());
        }
        let url = self.zone_url(name)?;
        let body = serde_json::json!({ "rrsets": changes.iter().map(change_to_dto).collect::<Vec<_>>() });
        let http = self.http.clone();
        let result = retry_with_backoff("patch_zone", self.retry_policy, || {
            let http = http.clone();
            let url = url.clone();
            let body = body.clone();
            async move {
                match http
                    .patch(url)
                    .header("X-API-Key", &self.token)
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(resp) if resp.status().is_success() => Attempt::Ok(()),
                    Ok(resp) if is_retryable_http_status(resp.status()) => {
                        metrics::record_replica_call("patch_zone", "retried");
                        Attempt::Retryable(EngineError::ReplicaUnavailable(format!(
                            "replica returned {}",
                            resp.status()
                        )))
                    }
                    Ok(resp) => Attempt::Fatal(EngineError::ReplicaRejected(format!(
                        "replica returned {}",
                        resp.status()
                    ))),
                    Err(e) => {
                        metrics::record_replica_call("patch_zone", "retried");
                        Attempt::Retryable(EngineError::ReplicaUnavailable(e.to_string()))
                    }
                }
            }
        })
        .await;

        match result {
            Ok(()) => {
                metrics::record_replica_call("patch_zone", "ok");
                Ok(())
            }
            Err(e) => {
                metrics::record_replica_call("patch_zone", "failed");
                Err(e)
            }
        }
    }

    async fn delete_zone(&self, name: &str) -> Result<(), EngineError> {
        let url = self.zone_url(name)?;
        let http = self.http.clone();
        let result = retry_with_backoff("delete_zone", self.retry_policy, || {
            let http = http.clone();
            let url = url.clone();
            async move { self.send("delete_zone", || http.delete(url.clone())).await }
        })
        .await;

        match result {
            Ok(_) => {
                metrics::record_replica_call("delete_zone", "ok");
                Ok(())
            }
            Err(e) => {
                metrics::record_replica_call("delete_zone", "failed");
                Err(e)
            }
        }
    }
}

fn change_to_dto(change: &RrsetChange) -> PdnsRrset {
    match change {
        RrsetChange::Replace(rrset) => PdnsRrset {
            name: rrset.name.clone(),
            rr_type: rrset.rr_type.clone(),
            ttl: rrset.ttl,
            changetype: Some("REPLACE".to_string()),
            records: rrset
                .records
                .iter()
                .map(|r| PdnsRecord { content: r.content.clone(), disabled: r.disabled })
                .collect(),
            comments: None,
        },
        RrsetChange::Delete { name, rr_type } => PdnsRrset {
            name: name.clone(),
            rr_type: rr_type.clone(),
            ttl: 0,
            changetype: Some("DELETE".to_string()),
            records: vec![],
            comments: None,
        },
    }
}

fn to_create_dto(zone: &Zone) -> PdnsZone {
    PdnsZone {
        name: normalize_replica_name(&zone.name),
        kind: match zone.kind {
            ZoneKind::Native => PdnsZoneKind::Native,
            ZoneKind::Primary => PdnsZoneKind::Primary,
            ZoneKind::Secondary => PdnsZoneKind::Secondary,
        },
        rrsets: Some(
            zone.rrsets
                .iter()
                .map(|rrset| PdnsRrset {
                    name: rrset.name.clone(),
                    rr_type: rrset.rr_type.clone(),
                    ttl: rrset.ttl,
                    changetype: None,
                    records: rrset
                        .records
                        .iter()
                        .map(|r| PdnsRecord { content: r.content.clone(), disabled: r.disabled })
                        .collect(),
                    comments: None,
                })
                .collect(),
        ),
        nameservers: Some(zone.nameservers.clone()),
        soa_edit_api: Some(zone.soa_edit_api.clone()),
    }
}

fn from_dto(dto: PdnsZone) -> Zone {
    let kind = match dto.kind {
        PdnsZoneKind::Native => ZoneKind::Native,
        PdnsZoneKind::Primary | PdnsZoneKind::MasterAlias => ZoneKind::Primary,
        PdnsZoneKind::Secondary | PdnsZoneKind::SlaveAlias => ZoneKind::Secondary,
    };
    let rrsets = dto
        .rrsets
        .unwrap_or_default()
        .into_iter()
        .map(|rrset| RecordSet {
            name: normalize_replica_name(&rrset.name),
            rr_type: rrset.rr_type.to_uppercase(),
            ttl: rrset.ttl,
            records: rrset
                .records
                .into_iter()
                .map(|r| Record { content: r.content, disabled: r.disabled })
                .collect(),
            comments: rrset.comments.unwrap_or_default(),
        })
        .collect();
    Zone {
        name: normalize_replica_name(&dto.name),
        kind,
        nameservers: dto.nameservers.unwrap_or_default(),
        soa_edit_api: dto.soa_edit_api.unwrap_or_else(|| "DEFAULT".to_string()),
        rrsets,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
