// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Message-bus subscriber (spec §4.8): an MQTT client whose event loop runs
//! in isolation from the reconcile path. Inbound publishes cross an
//! internal `mpsc` channel to a single consumer task that owns the
//! reconciler call, so the `rumqttc` callback context never re-enters
//! reconcile directly.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::MqttConfig;
use crate::gate::{ConcurrencyGate, DEFAULT_ACQUIRE_TIMEOUT};
use crate::metrics;
use crate::reconciler::ZoneReconciler;
use crate::state::ApplicationState;

const EVENT_TYPES: &[&str] = &["created", "updated", "deleted"];

#[derive(Debug, Deserialize)]
struct ZoneEventPayload {
    name: String,
}

/// Connect to the configured broker and run the receive loop until
/// `shutdown` fires. Returns once the event loop and consumer have both
/// stopped.
pub async fn run(
    config: MqttConfig,
    reconciler: Arc<ZoneReconciler>,
    gate: ConcurrencyGate,
    state: Arc<ApplicationState>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let Some(broker_url) = config.broker_url.clone() else {
        return;
    };

    let host = broker_url.host_str().unwrap_or("localhost").to_string();
    let port = broker_url
        .port()
        .unwrap_or(if broker_url.scheme() == "mqtts" { 8883 } else { 1883 });

    let mut options = MqttOptions::new(config.client_id.clone(), host, port);
    options.set_keep_alive(config.keepalive);
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username.clone(), password.clone());
    }

    let (client, mut eventloop) = AsyncClient::new(options, 64);

    let (tx, mut rx) = mpsc::channel::<(String, Vec<u8>)>(256);
    let qos = qos_from_u8(config.qos);

    for event in EVENT_TYPES {
        let topic = format!("{}/+/{event}", config.topic_prefix);
        if let Err(e) = client.subscribe(&topic, qos).await {
            error!(topic = %topic, error = %e, "failed to subscribe to message bus topic");
        }
    }

    state.set_message_bus_enabled(true);

    let consumer_reconciler = reconciler.clone();
    let consumer_gate = gate.clone();
    let consumer = tokio::spawn(async move {
        while let Some((topic, payload)) = rx.recv().await {
            let event = topic.rsplit('/').next().unwrap_or("unknown");
            match serde_json::from_slice::<ZoneEventPayload>(&payload) {
                Ok(event_payload) => {
                    metrics::record_bus_message(event);
                    match consumer_gate.acquire("bus_reconcile", DEFAULT_ACQUIRE_TIMEOUT).await {
                        Ok(guard) => {
                            if let Err(e) = consumer_reconciler.reconcile(&event_payload.name).await {
                                warn!(zone = %event_payload.name, error = %e, "bus-triggered reconcile failed");
                            }
                            drop(guard);
                        }
                        Err(e) => {
                            warn!(zone = %event_payload.name, error = %e, "bus-triggered reconcile dropped");
                        }
                    }
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "discarding malformed bus message");
                }
            }
        }
    });

    let mut reconnect_delay = config.reconnect_delay;
    loop {
        tokio::select! {
            poll_result = eventloop.poll() => {
                match poll_result {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        reconnect_delay = config.reconnect_delay;
                        state.set_message_bus_connected(true);
                        if tx.send((publish.topic.clone(), publish.payload.to_vec())).await.is_err() {
                            error!("message-bus consumer channel closed, dropping message");
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        reconnect_delay = config.reconnect_delay;
                        state.set_message_bus_connected(true);
                        info!("message bus connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        state.set_message_bus_connected(false);
                        warn!(error = %e, retry_in = ?reconnect_delay, "message bus connection error, backing off");
                        tokio::time::sleep(reconnect_delay).await;
                        reconnect_delay = (reconnect_delay * 2).min(Duration::from_secs(60));
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("message bus subscriber shutting down");
                    break;
                }
            }
        }
    }

    state.set_message_bus_connected(false);
    drop(tx);
    consumer.abort();
}

fn qos_from_u8(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_mapping_covers_all_configured_values() {
        assert_eq!(qos_from_u8(0), QoS::AtMostOnce);
        assert_eq!(qos_from_u8(1), QoS::AtLeastOnce);
        assert_eq!(qos_from_u8(2), QoS::ExactlyOnce);
    }
}
