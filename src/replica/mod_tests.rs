// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::model::ZoneKind;

fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_factor: 2.0,
    }
}

fn client(server: &MockServer) -> PdnsReplicaClient {
    PdnsReplicaClient::new(
        reqwest::Client::new(),
        url::Url::parse(&format!("{}/", server.uri())).unwrap(),
        "localhost".to_string(),
        "replica-token".to_string(),
    )
    .with_retry_policy(fast_retry_policy())
}

#[tokio::test]
async fn get_zone_returns_none_on_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/servers/localhost/zones/example.com."))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let zone = client(&server).get_zone("example.com").await.unwrap();
    assert!(zone.is_none());
}

#[tokio::test]
async fn get_zone_parses_rrsets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/servers/localhost/zones/example.com."))
        .and(header("X-API-Key", "replica-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "example.com.",
            "kind": "Native",
            "nameservers": ["ns1.example.com."],
            "rrsets": [{
                "name": "www.example.com.",
                "type": "A",
                "ttl": 300,
                "records": [{"content": "10.0.0.1", "disabled": false}],
            }],
        })))
        .mount(&server)
        .await;

    let zone = client(&server).get_zone("example.com").await.unwrap().unwrap();
    assert_eq!(zone.kind, ZoneKind::Native);
    assert_eq!(zone.rrsets.len(), 1);
    assert_eq!(zone.rrsets[0].rr_type, "A");
}

#[tokio::test]
async fn create_zone_treats_409_as_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/servers/localhost/zones"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let zone = Zone {
        name: "example.com.".into(),
        kind: ZoneKind::Native,
        nameservers: vec!["ns1.example.com.".into()],
        soa_edit_api: "DEFAULT".into(),
        rrsets: vec![],
    };
    client(&server).create_zone(&zone).await.unwrap();
}

#[tokio::test]
async fn create_zone_surfaces_non_conflict_4xx_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/servers/localhost/zones"))
        .respond_with(ResponseTemplate::new(422))
        .expect(1)
        .mount(&server)
        .await;

    let zone = Zone {
        name: "example.com.".into(),
        kind: ZoneKind::Native,
        nameservers: vec![],
        soa_edit_api: "DEFAULT".into(),
        rrsets: vec![],
    };
    let err = client(&server).create_zone(&zone).await.unwrap_err();
    assert!(matches!(err, EngineError::ReplicaRejected(_)));
}

#[tokio::test]
async fn s8_retry_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/servers/localhost/zones/example.com."))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/servers/localhost/zones/example.com."))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let changes = vec![RrsetChange::Delete {
        name: "ftp.example.com.".into(),
        rr_type: "A".into(),
    }];
    client(&server).patch_zone("example.com", &changes).await.unwrap();
}

#[tokio::test]
async fn patch_zone_is_noop_for_empty_changes() {
    let server = MockServer::start().await;
    // No mock registered: if patch_zone made a call, this would panic.
    client(&server).patch_zone("example.com", &[]).await.unwrap();
}

#[tokio::test]
async fn retry_bound_is_respected() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/servers/localhost/zones/example.com."))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server).delete_zone("example.com").await.unwrap_err();
    assert!(matches!(err, EngineError::ReplicaUnavailable(_)));
}
