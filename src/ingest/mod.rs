// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Event Ingest: the two inbound paths that feed zone reconcile intents
//! into the engine (spec §4.8) — an HTTP webhook receiver and an MQTT
//! message-bus subscriber.

pub mod http;
pub mod mqtt;
pub mod rate_limit;
