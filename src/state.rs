// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process-wide [`ApplicationState`], replacing the Python reference's
//! mutable status dictionary with explicit setters and a shallow-copy
//! read model (spec §9).
//!
//! Fields are updated only by their designated writer (the lifecycle task
//! or the bus callbacks) and read without any lock: the booleans are
//! `AtomicBool`s and the error string lives behind a small `RwLock` since it
//! is not single-word. Readers may observe a recent-but-stale snapshot,
//! which is acceptable for status reporting (spec §5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Instant;

/// Shared, process-wide application state.
pub struct ApplicationState {
    pub startup_time: Instant,
    initial_sync_started: AtomicBool,
    initial_sync_completed: AtomicBool,
    initial_sync_error: RwLock<Option<String>>,
    scheduler_running: AtomicBool,
    message_bus_connected: AtomicBool,
    message_bus_enabled: AtomicBool,
}

impl Default for ApplicationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            startup_time: Instant::now(),
            initial_sync_started: AtomicBool::new(false),
            initial_sync_completed: AtomicBool::new(false),
            initial_sync_error: RwLock::new(None),
            scheduler_running: AtomicBool::new(false),
            message_bus_connected: AtomicBool::new(false),
            message_bus_enabled: AtomicBool::new(false),
        }
    }

    pub fn mark_initial_sync_started(&self) {
        self.initial_sync_started.store(true, Ordering::SeqCst);
    }

    pub fn mark_initial_sync_completed(&self) {
        self.initial_sync_completed.store(true, Ordering::SeqCst);
    }

    pub fn record_initial_sync_error(&self, message: String) {
        *self.initial_sync_error.write().expect("state lock poisoned") = Some(message);
    }

    pub fn set_scheduler_running(&self, running: bool) {
        self.scheduler_running.store(running, Ordering::SeqCst);
    }

    pub fn set_message_bus_enabled(&self, enabled: bool) {
        self.message_bus_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_message_bus_connected(&self, connected: bool) {
        self.message_bus_connected.store(connected, Ordering::SeqCst);
    }

    /// Take a shallow, point-in-time copy of the current state for status
    /// reporting.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            uptime: self.startup_time.elapsed(),
            initial_sync_started: self.initial_sync_started.load(Ordering::SeqCst),
            initial_sync_completed: self.initial_sync_completed.load(Ordering::SeqCst),
            initial_sync_error: self
                .initial_sync_error
                .read()
                .expect("state lock poisoned")
                .clone(),
            scheduler_running: self.scheduler_running.load(Ordering::SeqCst),
            message_bus_enabled: self.message_bus_enabled.load(Ordering::SeqCst),
            message_bus_connected: self.message_bus_connected.load(Ordering::SeqCst),
        }
    }
}

/// A shallow, immutable copy of [`ApplicationState`] taken at one instant.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub uptime: std::time::Duration,
    pub initial_sync_started: bool,
    pub initial_sync_completed: bool,
    pub initial_sync_error: Option<String>,
    pub scheduler_running: bool,
    pub message_bus_enabled: bool,
    pub message_bus_connected: bool,
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod state_tests;
