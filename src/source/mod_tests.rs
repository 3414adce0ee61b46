// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use super::*;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> NetboxSourceClient {
    NetboxSourceClient::new(
        reqwest::Client::new(),
        url::Url::parse(&format!("{}/", server.uri())).unwrap(),
        "secret-token".to_string(),
    )
}

#[tokio::test]
async fn list_owned_zones_returns_normalized_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/plugins/netbox-dns/zones/"))
        .and(header("Authorization", "Token secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{"name": "Example.COM."}],
            "next": null,
        })))
        .mount(&server)
        .await;

    let zones = client(&server).list_owned_zones(1).await.unwrap();
    assert_eq!(zones, vec![ZoneSummary { name: "example.com".into() }]);
}

#[tokio::test]
async fn list_owned_zones_surfaces_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/plugins/netbox-dns/zones/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server).list_owned_zones(1).await.unwrap_err();
    assert!(matches!(err, EngineError::SourceAuth(_)));
}

#[tokio::test]
async fn get_zone_records_returns_none_when_zone_vanished() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/plugins/netbox-dns/zones/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [],
            "next": null,
        })))
        .mount(&server)
        .await;

    let zone = client(&server).get_zone_records("example.com").await.unwrap();
    assert!(zone.is_none());
}

#[tokio::test]
async fn get_nameserver_fqdn_normalizes_the_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/plugins/netbox-dns/nameservers/7/"))
        .and(header("Authorization", "Token secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "NS1.Example.COM",
        })))
        .mount(&server)
        .await;

    let fqdn = client(&server).get_nameserver_fqdn(7).await.unwrap();
    assert_eq!(fqdn, Some("ns1.example.com.".to_string()));
}

#[tokio::test]
async fn get_nameserver_fqdn_returns_none_when_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/plugins/netbox-dns/nameservers/99/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fqdn = client(&server).get_nameserver_fqdn(99).await.unwrap();
    assert_eq!(fqdn, None);
}

#[tokio::test]
async fn get_zone_records_groups_records_into_rrsets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/plugins/netbox-dns/zones/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{"id": 7, "name": "example.com", "nameservers": ["ns1.example.com."]}],
            "next": null,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/plugins/netbox-dns/records/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {"name": "www", "type": "a", "value": "10.0.0.1", "ttl": 300, "disabled": false},
            ],
            "next": null,
        })))
        .mount(&server)
        .await;

    let zone = client(&server)
        .get_zone_records("example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(zone.name, "example.com");
    assert_eq!(zone.nameservers, vec!["ns1.example.com."]);
    assert_eq!(zone.rrsets.len(), 1);
    assert_eq!(zone.rrsets[0].name, "www.example.com.");
    assert_eq!(zone.rrsets[0].rr_type, "A");
}
