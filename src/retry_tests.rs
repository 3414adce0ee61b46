// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicU32, Ordering};

use super::*;

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_factor: 2.0,
    }
}

#[tokio::test]
async fn succeeds_on_first_attempt_without_sleeping() {
    let calls = AtomicU32::new(0);
    let result: Result<u32, String> = retry_with_backoff("op", fast_policy(), || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Attempt::Ok(42) }
    })
    .await;
    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retries_until_success_within_max_attempts() {
    let calls = AtomicU32::new(0);
    let result: Result<u32, String> = retry_with_backoff("op", fast_policy(), || {
        let attempt = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt < 2 {
                Attempt::Retryable("transient".to_string())
            } else {
                Attempt::Ok(7)
            }
        }
    })
    .await;
    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn stops_immediately_on_fatal_error() {
    let calls = AtomicU32::new(0);
    let result: Result<u32, String> = retry_with_backoff("op", fast_policy(), || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Attempt::Fatal("permanent".to_string()) }
    })
    .await;
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausts_max_attempts_then_surfaces_error() {
    let calls = AtomicU32::new(0);
    let result: Result<u32, String> = retry_with_backoff("op", fast_policy(), || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Attempt::Retryable("still failing".to_string()) }
    })
    .await;
    assert_eq!(result.unwrap_err(), "still failing");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn delay_for_attempt_is_capped_at_max_delay() {
    let policy = RetryPolicy {
        max_attempts: 10,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(3),
        backoff_factor: 2.0,
    };
    // attempt 10: base * 2^9 would be enormous without the cap.
    let delay = policy.delay_for_attempt(10);
    assert!(delay <= Duration::from_secs(3));
}

#[test]
fn delay_for_attempt_stays_within_jittered_bounds() {
    let policy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(60),
        backoff_factor: 2.0,
    };
    // attempt 2: base * 2^1 * [0.5, 1.0] => [1s, 2s]
    let delay = policy.delay_for_attempt(2);
    assert!(delay >= Duration::from_secs(1));
    assert!(delay <= Duration::from_secs(2));
}

#[test]
fn retryable_http_statuses() {
    assert!(is_retryable_http_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
    assert!(is_retryable_http_status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
    assert!(is_retryable_http_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
    assert!(!is_retryable_http_status(reqwest::StatusCode::NOT_FOUND));
    assert!(!is_retryable_http_status(reqwest::StatusCode::BAD_REQUEST));
    assert!(!is_retryable_http_status(reqwest::StatusCode::OK));
}
