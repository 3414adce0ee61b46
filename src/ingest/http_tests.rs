// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::Request;
use tower::ServiceExt;

use super::*;
use crate::diff::RrsetChange;
use crate::gate::ConcurrencyGate;
use crate::model::Zone;
use crate::replica::{ReplicaClient, ReplicaZoneSummary};
use crate::source::{SourceClient, ZoneSummary};

struct FakeSource;

#[async_trait]
impl SourceClient for FakeSource {
    async fn list_owned_zones(&self, _nameserver_id: u64) -> Result<Vec<ZoneSummary>, EngineError> {
        Ok(vec![])
    }
    async fn get_zone_records(&self, _zone_name: &str) -> Result<Option<Zone>, EngineError> {
        Ok(None)
    }
    async fn get_nameserver_fqdn(&self, _nameserver_id: u64) -> Result<Option<String>, EngineError> {
        Ok(Some("ns1.example.com.".to_string()))
    }
}

#[derive(Default)]
struct FakeReplica {
    reconciled: Mutex<Vec<String>>,
}

#[async_trait]
impl ReplicaClient for FakeReplica {
    async fn get_zone(&self, name: &str) -> Result<Option<Zone>, EngineError> {
        self.reconciled.lock().unwrap().push(name.to_string());
        Ok(None)
    }
    async fn list_zones(&self) -> Result<Vec<ReplicaZoneSummary>, EngineError> {
        Ok(vec![])
    }
    async fn create_zone(&self, _zone: &Zone) -> Result<(), EngineError> {
        Ok(())
    }
    async fn patch_zone(&self, _name: &str, _changes: &[RrsetChange]) -> Result<(), EngineError> {
        Ok(())
    }
    async fn delete_zone(&self, _name: &str) -> Result<(), EngineError> {
        Ok(())
    }
}

fn test_state(webhook_secret: Option<&str>) -> IngestState {
    let source = Arc::new(FakeSource);
    let replica = Arc::new(FakeReplica::default());
    let reconciler = Arc::new(ZoneReconciler::new(
        source.clone(),
        replica.clone(),
        "ns1.example.com.".into(),
        std::collections::HashSet::new(),
    ));
    let orchestrator = Arc::new(FullSyncOrchestrator::new(
        source,
        replica,
        reconciler.clone(),
        ConcurrencyGate::new(),
        1,
        "ns1.example.com.".into(),
    ));
    IngestState {
        reconciler,
        orchestrator,
        gate: ConcurrencyGate::new(),
        app_state: Arc::new(ApplicationState::new()),
        api_key: "test-api-key".to_string(),
        webhook_secret: webhook_secret.map(str::to_string),
        rate_limiter: Arc::new(RateLimiter::new()),
    }
}

async fn oneshot(state: IngestState, request: Request<Body>) -> axum::http::Response<Body> {
    let addr: SocketAddr = "127.0.0.1:12345".parse().unwrap();
    let app = router(state).layer(MockConnectInfo(addr));
    app.oneshot(request).await.unwrap()
}

#[tokio::test]
async fn health_requires_no_auth() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = oneshot(test_state(None), request).await;
    assert_eq!(response.status(), 200);
    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "Healthy");
}

#[tokio::test]
async fn zones_create_rejects_missing_api_key() {
    let request = Request::builder()
        .method("POST")
        .uri("/zones/create")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"id":1,"name":"example.com"}"#))
        .unwrap();
    let response = oneshot(test_state(None), request).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn zones_create_accepts_valid_api_key() {
    let request = Request::builder()
        .method("POST")
        .uri("/zones/create")
        .header("content-type", "application/json")
        .header("x-netbox-pdns-api-key", "test-api-key")
        .body(Body::from(r#"{"id":1,"name":"example.com"}"#))
        .unwrap();
    let response = oneshot(test_state(None), request).await;
    assert_eq!(response.status(), 202);
}

#[tokio::test]
async fn zones_create_rejects_malformed_body() {
    let request = Request::builder()
        .method("POST")
        .uri("/zones/create")
        .header("content-type", "application/json")
        .header("x-netbox-pdns-api-key", "test-api-key")
        .body(Body::from("not json"))
        .unwrap();
    let response = oneshot(test_state(None), request).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn zones_create_requires_signature_when_secret_configured() {
    let request = Request::builder()
        .method("POST")
        .uri("/zones/create")
        .header("content-type", "application/json")
        .header("x-netbox-pdns-api-key", "test-api-key")
        .body(Body::from(r#"{"id":1,"name":"example.com"}"#))
        .unwrap();
    let response = oneshot(test_state(Some("shared-secret")), request).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn zones_create_accepts_valid_signature() {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let body = r#"{"id":1,"name":"example.com"}"#;
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(b"shared-secret").unwrap();
    mac.update(body.as_bytes());
    let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

    let request = Request::builder()
        .method("POST")
        .uri("/zones/create")
        .header("content-type", "application/json")
        .header("x-netbox-pdns-api-key", "test-api-key")
        .header("x-hub-signature-256", signature)
        .body(Body::from(body))
        .unwrap();
    let response = oneshot(test_state(Some("shared-secret")), request).await;
    assert_eq!(response.status(), 202);
}

#[tokio::test]
async fn status_is_not_rate_limited_by_api_key_but_is_rate_limited_by_ip() {
    let state = test_state(None);
    for _ in 0..30 {
        let request = Request::builder().uri("/status").body(Body::empty()).unwrap();
        let response = oneshot(state.clone(), request).await;
        assert_eq!(response.status(), 200);
    }
    let request = Request::builder().uri("/status").body(Body::empty()).unwrap();
    let response = oneshot(state, request).await;
    assert_eq!(response.status(), 429);
}

#[tokio::test]
async fn metrics_endpoint_is_ambient_and_unauthenticated() {
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = oneshot(test_state(None), request).await;
    assert_eq!(response.status(), 200);
}
