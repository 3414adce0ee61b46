// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Health/status computation (spec §6): turns an [`ApplicationState`]
//! snapshot into the `Healthy`/`Warning`/`Degraded` verdict and its JSON
//! representation.

use std::time::Duration;

use serde::Serialize;

use crate::state::StatusSnapshot;

/// Uptime threshold past which an incomplete initial sync degrades health
/// to `Warning` (spec §6).
const INITIAL_SYNC_WARNING_THRESHOLD: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct InitialSyncStatus {
    pub started: bool,
    pub completed: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub jobs_count: u32,
}

#[derive(Debug, Serialize)]
pub struct MqttStatus {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: HealthStatus,
    pub uptime_seconds: u64,
    pub initial_sync: InitialSyncStatus,
    pub scheduler: SchedulerStatus,
    pub mqtt: MqttStatus,
}

/// Build the full status response from a state snapshot.
#[must_use]
pub fn build_status(snapshot: &StatusSnapshot) -> StatusResponse {
    let status = health_verdict(snapshot);
    StatusResponse {
        status,
        uptime_seconds: snapshot.uptime.as_secs(),
        initial_sync: InitialSyncStatus {
            started: snapshot.initial_sync_started,
            completed: snapshot.initial_sync_completed,
            error: snapshot.initial_sync_error.clone(),
        },
        scheduler: SchedulerStatus {
            running: snapshot.scheduler_running,
            jobs_count: u32::from(snapshot.scheduler_running),
        },
        mqtt: MqttStatus {
            enabled: snapshot.message_bus_enabled,
            connected: snapshot.message_bus_enabled.then_some(snapshot.message_bus_connected),
        },
    }
}

/// Compute the health verdict per spec §6: `Degraded` if the initial sync
/// recorded an error, else `Warning` if it still hasn't completed after the
/// warning threshold, else `Healthy`.
#[must_use]
fn health_verdict(snapshot: &StatusSnapshot) -> HealthStatus {
    if snapshot.initial_sync_error.is_some() {
        return HealthStatus::Degraded;
    }
    if !snapshot.initial_sync_completed && snapshot.uptime > INITIAL_SYNC_WARNING_THRESHOLD {
        return HealthStatus::Warning;
    }
    HealthStatus::Healthy
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
