//! OpenCanary event decoding
//!
//! Turns one raw JSON log line into a one-line alert message. Anything that is
//! not a JSON object is dropped; missing fields fall back to placeholders.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// `logdata` keys rendered into the alert, in output order
pub const EXTRA_KEYS: [&str; 6] = ["USERNAME", "PASSWORD", "SENSORID", "PUBLICKEY", "URL", "DATA"];

/// One decoded OpenCanary event. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityEvent {
    pub local_time: Option<Value>,
    pub timestamp: Option<Value>,
    pub node_id: Option<Value>,
    pub service: Option<Value>,
    pub src_host: Option<Value>,
    pub dst_port: Option<Value>,
    pub logdata: Option<Value>,
}

impl SecurityEvent {
    /// Parse a raw line; None unless it is a JSON object
    pub fn parse(line: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(line.trim()).ok()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// `local_time`, falling back to `timestamp` when absent or empty
    pub fn time(&self) -> Option<String> {
        let nonempty = |value: &Option<Value>| value.as_ref().and_then(render_value).filter(|s| !s.is_empty());
        nonempty(&self.local_time).or_else(|| nonempty(&self.timestamp))
    }

    /// Recognized `logdata` entries in fixed key order
    pub fn extras(&self) -> Vec<(&'static str, String)> {
        let Some(data) = self.logdata.as_ref().and_then(Value::as_object) else {
            return Vec::new();
        };
        extras_from(data)
    }
}

fn extras_from(data: &Map<String, Value>) -> Vec<(&'static str, String)> {
    EXTRA_KEYS
        .iter()
        .filter_map(|&key| render_value(data.get(key)?).map(|v| (key, v)))
        .collect()
}

/// Strings verbatim, null as absent, everything else as compact JSON
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Formatted alert text derived from one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage(String);

impl AlertMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&SecurityEvent> for AlertMessage {
    fn from(event: &SecurityEvent) -> Self {
        let or = |value: Option<&Value>, placeholder: &str| {
            value
                .and_then(render_value)
                .unwrap_or_else(|| placeholder.to_string())
        };

        let mut text = format!(
            "[OpenCanary] time={} node={} service={} port={} src={}",
            event.time().unwrap_or_else(|| "unknown-time".to_string()),
            or(event.node_id.as_ref(), "unknown-node"),
            or(event.service.as_ref(), "unknown-service"),
            or(event.dst_port.as_ref(), "?"),
            or(event.src_host.as_ref(), "unknown-src"),
        );

        for (key, value) in event.extras() {
            text.push(' ');
            text.push_str(key);
            text.push('=');
            text.push_str(&value);
        }

        Self(text)
    }
}

impl fmt::Display for AlertMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decode one raw log line into an alert, or None if it is not an event
pub fn decode(line: &str) -> Option<AlertMessage> {
    match SecurityEvent::parse(line) {
        Some(event) => Some(AlertMessage::from(&event)),
        None => {
            if !line.trim().is_empty() {
                log::debug!("Discarding non-event line ({} bytes)", line.len());
            }
            None
        }
    }
}
