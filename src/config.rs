// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed, validated-once configuration loaded from the process environment.
//!
//! Every variable lives under the `NETBOX_PDNS_` prefix (see spec §6). Loading
//! happens exactly once, in [`Config::from_env`], and produces either a fully
//! validated [`Config`] or an [`crate::error::EngineError::ConfigInvalid`].
//! Nothing else in the crate reads `std::env` directly.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::EngineError;

/// Environment variable prefix shared by every setting.
const PREFIX: &str = "NETBOX_PDNS_";

/// Default managed RR types per spec §4.3 / §9 (open question resolved).
const DEFAULT_MANAGED_TYPES: &[&str] = &[
    "A", "AAAA", "CNAME", "MX", "TXT", "SRV", "NS", "PTR", "CAA", "SOA",
];

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub nb_url: url::Url,
    pub nb_token: String,
    pub nb_ns_id: u64,
    pub pdns_url: url::Url,
    pub pdns_token: String,
    pub pdns_server_id: String,
    pub webhook_secret: Option<String>,
    pub sync_crontab: String,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
    pub managed_types: HashSet<String>,
    pub mqtt: MqttConfig,
}

/// Logging verbosity, mirrors the Python reference's level names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Render as the `tracing`/`EnvFilter` directive it corresponds to.
    #[must_use]
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
            LogLevel::Critical => "error",
        }
    }
}

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// MQTT message-bus subscriber configuration.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub enabled: bool,
    pub broker_url: Option<url::Url>,
    pub client_id: String,
    pub topic_prefix: String,
    pub qos: u8,
    pub keepalive: Duration,
    pub reconnect_delay: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// Load and validate configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigInvalid`] with a specific message for the
    /// first validation failure encountered.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::from_env()?;
    /// ```
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_source(&std::env::vars().collect::<Vec<_>>())
    }

    /// Load and validate configuration from an explicit list of `(key,
    /// value)` pairs. Kept separate from [`Config::from_env`] so tests never
    /// have to mutate real process environment variables.
    pub fn from_source(vars: &[(String, String)]) -> Result<Self, EngineError> {
        let get = |name: &str| -> Option<String> {
            let key = format!("{PREFIX}{name}");
            vars.iter()
                .find(|(k, _)| k == &key)
                .map(|(_, v)| v.clone())
        };

        let required = |name: &str| -> Result<String, EngineError> {
            get(name).filter(|v| !v.is_empty()).ok_or_else(|| {
                EngineError::ConfigInvalid(format!("missing required setting {PREFIX}{name}"))
            })
        };

        let api_key = required("API_KEY")?;
        let nb_url = parse_url(&required("NB_URL")?, "NB_URL")?;
        let nb_token = required("NB_TOKEN")?;
        let nb_ns_id = required("NB_NS_ID")?
            .parse::<u64>()
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| {
                EngineError::ConfigInvalid(format!("{PREFIX}NB_NS_ID must be a positive integer"))
            })?;
        let pdns_url = parse_url(&required("PDNS_URL")?, "PDNS_URL")?;
        let pdns_token = required("PDNS_TOKEN")?;

        let pdns_server_id = get("PDNS_SERVER_ID").unwrap_or_else(|| "localhost".to_string());
        let webhook_secret = get("WEBHOOK_SECRET").filter(|s| !s.is_empty());
        let sync_crontab = get("SYNC_CRONTAB").unwrap_or_else(|| "*/15 * * * *".to_string());
        validate_crontab(&sync_crontab)?;

        let log_level = match get("LOG_LEVEL")
            .unwrap_or_else(|| "INFO".to_string())
            .to_uppercase()
            .as_str()
        {
            "DEBUG" => LogLevel::Debug,
            "INFO" => LogLevel::Info,
            "WARNING" => LogLevel::Warning,
            "ERROR" => LogLevel::Error,
            "CRITICAL" => LogLevel::Critical,
            other => {
                return Err(EngineError::ConfigInvalid(format!(
                    "{PREFIX}LOG_LEVEL must be one of DEBUG/INFO/WARNING/ERROR/CRITICAL, got {other}"
                )))
            }
        };

        let log_format = match get("LOG_FORMAT")
            .unwrap_or_else(|| "text".to_string())
            .to_lowercase()
            .as_str()
        {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => {
                return Err(EngineError::ConfigInvalid(format!(
                    "{PREFIX}LOG_FORMAT must be text or json, got {other}"
                )))
            }
        };

        let managed_types = match get("MANAGED_TYPES") {
            Some(raw) if !raw.is_empty() => raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => DEFAULT_MANAGED_TYPES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        };

        let mqtt = parse_mqtt(&get, &vars.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>())?;

        Ok(Config {
            api_key,
            nb_url,
            nb_token,
            nb_ns_id,
            pdns_url,
            pdns_token,
            pdns_server_id,
            webhook_secret,
            sync_crontab,
            log_level,
            log_format,
            managed_types,
            mqtt,
        })
    }
}

fn parse_mqtt(
    get: &dyn Fn(&str) -> Option<String>,
    _present_keys: &[&str],
) -> Result<MqttConfig, EngineError> {
    let enabled = get("MQTT_ENABLED")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    let broker_url = match get("MQTT_BROKER_URL") {
        Some(raw) => Some(parse_broker_url(&raw)?),
        None if enabled => {
            return Err(EngineError::ConfigInvalid(format!(
                "{PREFIX}MQTT_BROKER_URL is required when {PREFIX}MQTT_ENABLED is true"
            )))
        }
        None => None,
    };

    let client_id = get("MQTT_CLIENT_ID").unwrap_or_else(|| "netbox-pdns".to_string());
    let topic_prefix = get("MQTT_TOPIC_PREFIX").unwrap_or_else(|| "dns/zones".to_string());

    let qos = match get("MQTT_QOS").unwrap_or_else(|| "1".to_string()).parse::<u8>() {
        Ok(v @ 0..=2) => v,
        _ => {
            return Err(EngineError::ConfigInvalid(format!(
                "{PREFIX}MQTT_QOS must be 0, 1, or 2"
            )))
        }
    };

    let keepalive = parse_ranged_secs(get, "MQTT_KEEPALIVE", 60, 10, 3600)?;
    let reconnect_delay = parse_ranged_secs(get, "MQTT_RECONNECT_DELAY", 5, 1, 300)?;

    let username = get("MQTT_USERNAME");
    let password = get("MQTT_PASSWORD");
    if username.is_some() != password.is_some() {
        return Err(EngineError::ConfigInvalid(format!(
            "{PREFIX}MQTT_USERNAME and {PREFIX}MQTT_PASSWORD must both be set or both be absent"
        )));
    }

    Ok(MqttConfig {
        enabled,
        broker_url,
        client_id,
        topic_prefix,
        qos,
        keepalive,
        reconnect_delay,
        username,
        password,
    })
}

fn parse_ranged_secs(
    get: &dyn Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<Duration, EngineError> {
    let value = match get(name) {
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            EngineError::ConfigInvalid(format!("{PREFIX}{name} must be an integer"))
        })?,
        None => default,
    };
    if !(min..=max).contains(&value) {
        return Err(EngineError::ConfigInvalid(format!(
            "{PREFIX}{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(Duration::from_secs(value))
}

fn parse_url(raw: &str, name: &str) -> Result<url::Url, EngineError> {
    url::Url::parse(raw)
        .map_err(|e| EngineError::ConfigInvalid(format!("{PREFIX}{name} is not a valid URL: {e}")))
}

fn parse_broker_url(raw: &str) -> Result<url::Url, EngineError> {
    let url = parse_url(raw, "MQTT_BROKER_URL")?;
    match url.scheme() {
        "mqtt" | "mqtts" => Ok(url),
        other => Err(EngineError::ConfigInvalid(format!(
            "{PREFIX}MQTT_BROKER_URL scheme must be mqtt or mqtts, got {other}"
        ))),
    }
}

fn validate_crontab(expr: &str) -> Result<(), EngineError> {
    // A 5-field cron expression; the `cron` crate expects 6 fields (seconds
    // leading), so we prepend "0" for seconds the way a 5-field scheduler
    // implicitly fires at :00.
    let six_field = format!("0 {expr}");
    six_field
        .parse::<cron::Schedule>()
        .map(|_| ())
        .map_err(|e| {
            EngineError::ConfigInvalid(format!("{PREFIX}SYNC_CRONTAB is invalid: {e}"))
        })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
