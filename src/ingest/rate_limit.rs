// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-source-IP, per-endpoint-class rate limiting for the webhook surface
//! (spec §4.8). A fixed-window counter per `(ip, class)`, reset once the
//! window elapses — simple over precise, since the webhook surface is
//! low-volume by design.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The rate-limited endpoint classes named in spec §4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Health,
    Status,
    Sync,
    Zones,
}

impl EndpointClass {
    #[must_use]
    pub fn limit(self) -> u32 {
        match self {
            EndpointClass::Health => 100,
            EndpointClass::Status => 30,
            EndpointClass::Sync => 5,
            EndpointClass::Zones => 20,
        }
    }

    #[must_use]
    pub fn window(self) -> Duration {
        Duration::from_secs(60)
    }
}

struct Window {
    count: u32,
    started_at: Instant,
}

/// Tracks request counts per `(ip, class)` window.
#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<(IpAddr, EndpointClass), Window>>,
}

/// Outcome of a rate-limit check, carrying the headers the response must
/// include either way.
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request from `ip` against `class`, returning whether it is
    /// allowed under the class's limit.
    pub fn check(&self, ip: IpAddr, class: EndpointClass) -> Decision {
        let limit = class.limit();
        let window_len = class.window();
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");

        let window = windows.entry((ip, class)).or_insert(Window { count: 0, started_at: now });
        if now.duration_since(window.started_at) >= window_len {
            window.count = 0;
            window.started_at = now;
        }

        let reset_after = window_len.saturating_sub(now.duration_since(window.started_at));

        if window.count >= limit {
            return Decision { allowed: false, limit, remaining: 0, reset_after };
        }

        window.count += 1;
        Decision {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(window.count),
            reset_after,
        }
    }
}
