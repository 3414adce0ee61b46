// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The webhook receiver: `axum` routes plus the rate-limiter →
//! authenticator → signature-verifier → handler middleware chain
//! (spec §4.8).

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::EngineError;
use crate::gate::{ConcurrencyGate, DEFAULT_ACQUIRE_TIMEOUT};
use crate::metrics;
use crate::orchestrator::FullSyncOrchestrator;
use crate::reconciler::ZoneReconciler;
use crate::state::ApplicationState;
use crate::status::{build_status, HealthStatus};

use super::rate_limit::{EndpointClass, RateLimiter};

const API_KEY_HEADER: &str = "x-netbox-pdns-api-key";
const SIGNATURE_HEADERS: &[&str] = &["x-hub-signature-256", "x-signature-256"];

/// Shared state handed to every handler and middleware stage.
#[derive(Clone)]
pub struct IngestState {
    pub reconciler: Arc<ZoneReconciler>,
    pub orchestrator: Arc<FullSyncOrchestrator>,
    pub gate: ConcurrencyGate,
    pub app_state: Arc<ApplicationState>,
    pub api_key: String,
    pub webhook_secret: Option<String>,
    pub rate_limiter: Arc<RateLimiter>,
}

/// Build the `axum` router for the full webhook + status + metrics surface.
#[must_use]
pub fn router(state: IngestState) -> Router {
    let mutating = Router::new()
        .route("/zones/create", post(zones_create))
        .route("/zones/update", post(zones_update))
        .route("/zones/delete", post(zones_delete))
        .route("/sync", post(sync))
        .layer(middleware::from_fn_with_state(state.clone(), verify_signature))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    let readonly_gated = Router::new()
        .route("/status", get(status))
        .route("/mqtt/status", get(mqtt_status))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    let ambient = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text));

    Router::new()
        .merge(mutating)
        .merge(readonly_gated)
        .merge(ambient)
        .with_state(state)
}

fn endpoint_class(path: &str) -> Option<EndpointClass> {
    match path {
        "/health" => Some(EndpointClass::Health),
        "/status" | "/mqtt/status" => Some(EndpointClass::Status),
        "/sync" => Some(EndpointClass::Sync),
        p if p.starts_with("/zones/") => Some(EndpointClass::Zones),
        _ => None,
    }
}

fn client_ip(headers: &HeaderMap, connect_info: Option<SocketAddr>) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| connect_info.map(|a| a.ip()))
        .unwrap_or(IpAddr::from([0, 0, 0, 0]))
}

async fn rate_limit(
    State(state): State<IngestState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let Some(class) = endpoint_class(request.uri().path()) else {
        return next.run(request).await;
    };
    let ip = client_ip(request.headers(), Some(addr));
    let decision = state.rate_limiter.check(ip, class);

    if !decision.allowed {
        metrics::record_webhook_request(request.uri().path(), "rate_limited");
        let err = EngineError::RateLimited {
            limit: decision.limit.to_string(),
            window: "60s".to_string(),
        };
        return with_rate_limit_headers(err.into_response(), &decision);
    }

    let mut response = next.run(request).await;
    response = with_rate_limit_headers(response, &decision);
    response
}

fn with_rate_limit_headers(
    mut response: Response,
    decision: &super::rate_limit::Decision,
) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        "X-RateLimit-Limit",
        decision.limit.to_string().parse().expect("digits are valid header values"),
    );
    headers.insert(
        "X-RateLimit-Remaining",
        decision.remaining.to_string().parse().expect("digits are valid header values"),
    );
    headers.insert(
        "X-RateLimit-Reset",
        decision.reset_after.as_secs().to_string().parse().expect("digits are valid header values"),
    );
    response
}

async fn authenticate(State(state): State<IngestState>, request: Request, next: Next) -> Response {
    if !requires_auth(request.uri().path()) {
        return next.run(request).await;
    }
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !ct_eq(provided, &state.api_key) {
        warn!(path = %request.uri().path(), "webhook request rejected: bad api key");
        metrics::record_webhook_request(request.uri().path(), "unauthorized");
        return EngineError::AuthFailed("invalid or missing API key".to_string()).into_response();
    }
    next.run(request).await
}

async fn verify_signature(State(state): State<IngestState>, request: Request, next: Next) -> Response {
    let Some(secret) = state.webhook_secret.clone() else {
        return next.run(request).await;
    };
    if !requires_auth(request.uri().path()) {
        return next.run(request).await;
    }

    let provided_signature = SIGNATURE_HEADERS
        .iter()
        .find_map(|name| request.headers().get(*name))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, 1024 * 1024).await {
        Ok(b) => b,
        Err(_) => {
            return EngineError::MalformedPayload("could not read request body".to_string())
                .into_response()
        }
    };

    let Some(provided_signature) = provided_signature else {
        warn!("webhook request rejected: missing signature header");
        return EngineError::AuthFailed("missing webhook signature".to_string()).into_response();
    };

    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(&bytes);
    let expected = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

    if !ct_eq(&provided_signature, &expected) {
        warn!("webhook request rejected: signature mismatch");
        return EngineError::SignatureInvalid("HMAC signature did not match".to_string())
            .into_response();
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    next.run(request).await
}

fn requires_auth(path: &str) -> bool {
    matches!(path, "/sync") || path.starts_with("/zones/")
}

fn ct_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[derive(Debug, Deserialize)]
struct ZoneEventBody {
    #[allow(dead_code)]
    id: Option<i64>,
    name: String,
}

#[derive(Debug, Serialize)]
struct Accepted {
    status: &'static str,
}

async fn zones_create(state: State<IngestState>, body: axum::body::Bytes) -> Response {
    handle_zone_event(state, body, "zones/create").await
}

async fn zones_update(state: State<IngestState>, body: axum::body::Bytes) -> Response {
    handle_zone_event(state, body, "zones/update").await
}

async fn zones_delete(state: State<IngestState>, body: axum::body::Bytes) -> Response {
    handle_zone_event(state, body, "zones/delete").await
}

async fn handle_zone_event(State(state): State<IngestState>, body: axum::body::Bytes, route: &str) -> Response {
    let event: ZoneEventBody = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            metrics::record_webhook_request(route, "bad_request");
            return EngineError::MalformedPayload(e.to_string()).into_response();
        }
    };

    let zone_name = event.name.clone();
    let reconciler = state.reconciler.clone();
    let gate = state.gate.clone();
    tokio::spawn(async move {
        let guard = match gate.acquire("webhook_reconcile", DEFAULT_ACQUIRE_TIMEOUT).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!(zone = %zone_name, error = %e, "webhook-triggered reconcile dropped");
                return;
            }
        };
        if let Err(e) = reconciler.reconcile(&zone_name).await {
            warn!(zone = %zone_name, error = %e, "webhook-triggered reconcile failed");
        }
        drop(guard);
    });

    metrics::record_webhook_request(route, "accepted");
    (StatusCode::ACCEPTED, Json(Accepted { status: "queued" })).into_response()
}

async fn sync(State(state): State<IngestState>) -> Response {
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.full_sync("manual").await {
            warn!(error = %e, "manual full sync failed");
        }
    });
    metrics::record_webhook_request("sync", "accepted");
    (StatusCode::ACCEPTED, Json(Accepted { status: "queued" })).into_response()
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": HealthStatus::Healthy })))
}

async fn status(State(state): State<IngestState>) -> impl IntoResponse {
    Json(build_status(&state.app_state.snapshot()))
}

async fn mqtt_status(State(state): State<IngestState>) -> impl IntoResponse {
    let snapshot = state.app_state.snapshot();
    Json(serde_json::json!({
        "enabled": snapshot.message_bus_enabled,
        "connected": snapshot.message_bus_connected,
    }))
}

async fn metrics_text() -> Response {
    match metrics::gather() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to gather metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to gather metrics").into_response()
        }
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod http_tests;
