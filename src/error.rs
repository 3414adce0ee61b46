// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The error taxonomy shared by every module.
//!
//! Every fallible boundary in this crate returns [`EngineError`] (or wraps one
//! via `#[from]`/`anyhow`). Keeping a single enum lets the HTTP ingest layer
//! map failures to status codes in one place instead of re-deriving the
//! mapping per handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// The unified error type for the synchronization engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration failed validation at startup.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The source inventory could not be reached (transport failure after
    /// retries, or a timeout).
    #[error("source inventory unavailable: {0}")]
    SourceUnavailable(String),

    /// The source inventory rejected our credentials (401/403).
    #[error("source inventory authentication failed: {0}")]
    SourceAuth(String),

    /// The source inventory reports the zone does not exist.
    #[error("zone not found in source inventory: {0}")]
    SourceNotFound(String),

    /// The replica could not be reached (transport failure after retries).
    #[error("replica unavailable: {0}")]
    ReplicaUnavailable(String),

    /// The replica reported a conflict that was not recoverable.
    #[error("replica conflict: {0}")]
    ReplicaConflict(String),

    /// The replica rejected the request outright (4xx other than a
    /// create-conflict).
    #[error("replica rejected request: {0}")]
    ReplicaRejected(String),

    /// The concurrency gate could not be acquired within its timeout.
    #[error("timed out waiting for the concurrency gate ({operation})")]
    GateTimeout {
        /// Name of the operation that failed to acquire the gate.
        operation: String,
    },

    /// Inbound webhook credentials were missing or incorrect.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Inbound webhook HMAC signature was missing or did not match.
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    /// A rate limit was exceeded for the given class of request.
    #[error("rate limited: {limit} per {window}")]
    RateLimited {
        /// The configured limit, formatted for display (e.g. "20").
        limit: String,
        /// The configured window, formatted for display (e.g. "60s").
        window: String,
    },

    /// The request body could not be parsed.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Maps engine errors onto the HTTP responses the webhook surface promises.
///
/// Only the ingest-facing variants are expected to reach an `axum` handler;
/// anything else collapses to `500` since it indicates a programming error
/// rather than a caller mistake.
impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            EngineError::AuthFailed(msg) | EngineError::SignatureInvalid(msg) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Unauthorized", "detail": msg }),
            ),
            EngineError::RateLimited { limit, window } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "Rate limit exceeded",
                    "detail": format!("{limit} per {window}"),
                }),
            ),
            EngineError::MalformedPayload(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Malformed payload", "detail": msg }),
            ),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal error", "detail": other.to_string() }),
            ),
        };
        (status, axum::Json(body)).into_response()
    }
}
