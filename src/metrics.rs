// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the sync engine, namespaced `netbox_pdns_`.
//!
//! Exposed as plain text via the `/metrics` HTTP route (spec §6).

use std::sync::LazyLock;
use std::time::Duration;

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

const METRICS_NAMESPACE: &str = "netbox_pdns";

/// Global Prometheus registry. Every metric below registers itself here on
/// first use.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Outcomes of a single-zone reconcile, by outcome label
/// (`created`/`updated`/`unchanged`/`deleted`/`skipped`/`error`).
pub static RECONCILE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconcile_total"),
        "Total zone reconciles by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).expect("metric labels are static");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric registered exactly once");
    counter
});

/// Full-sync run durations.
pub static SYNC_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_sync_duration_seconds"),
        "Duration of full-sync runs",
    )
    .buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]);
    let histogram = HistogramVec::new(opts, &["trigger"]).expect("metric labels are static");
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("metric registered exactly once");
    histogram
});

/// Full syncs by outcome (`completed`/`skipped_overlap`/`source_unavailable`).
pub static SYNC_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_sync_total"),
        "Total full-sync runs by outcome and trigger",
    );
    let counter = CounterVec::new(opts, &["trigger", "outcome"]).expect("metric labels are static");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric registered exactly once");
    counter
});

/// Replica HTTP calls by endpoint and result (`ok`/`retried`/`failed`).
pub static REPLICA_CALLS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_replica_calls_total"),
        "Total replica API calls by operation and result",
    );
    let counter = CounterVec::new(opts, &["operation", "result"]).expect("metric labels are static");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric registered exactly once");
    counter
});

/// Webhook requests received, by route and response class.
pub static WEBHOOK_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_webhook_requests_total"),
        "Total inbound webhook requests by route and outcome",
    );
    let counter = CounterVec::new(opts, &["route", "outcome"]).expect("metric labels are static");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric registered exactly once");
    counter
});

/// Messages consumed from the MQTT bus, by event type.
pub static BUS_MESSAGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_bus_messages_total"),
        "Total message-bus events consumed by event type",
    );
    let counter = CounterVec::new(opts, &["event"]).expect("metric labels are static");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric registered exactly once");
    counter
});

/// Time spent waiting to acquire the concurrency gate.
pub static GATE_WAIT_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_gate_wait_seconds"),
        "Time spent waiting to acquire the concurrency gate",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["operation"]).expect("metric labels are static");
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("metric registered exactly once");
    histogram
});

pub fn record_reconcile_outcome(outcome: &str) {
    RECONCILE_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_sync(trigger: &str, outcome: &str, duration: Duration) {
    SYNC_TOTAL.with_label_values(&[trigger, outcome]).inc();
    SYNC_DURATION_SECONDS
        .with_label_values(&[trigger])
        .observe(duration.as_secs_f64());
}

pub fn record_replica_call(operation: &str, result: &str) {
    REPLICA_CALLS_TOTAL.with_label_values(&[operation, result]).inc();
}

pub fn record_webhook_request(route: &str, outcome: &str) {
    WEBHOOK_REQUESTS_TOTAL.with_label_values(&[route, outcome]).inc();
}

pub fn record_bus_message(event: &str) {
    BUS_MESSAGES_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_gate_wait(operation: &str, waited: Duration) {
    GATE_WAIT_SECONDS
        .with_label_values(&[operation])
        .observe(waited.as_secs_f64());
}

/// Render the registry in Prometheus text exposition format.
///
/// # Errors
///
/// Returns an error if encoding the gathered metric families fails.
pub fn gather() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_includes_namespace_and_reconcile_metric() {
        record_reconcile_outcome("created");
        let text = gather().expect("gather should succeed");
        assert!(text.contains("netbox_pdns_reconcile_total"));
    }
}
