//! Envelope decoding
//!
//! One newline-delimited message is one JSON object:
//! `{"event_type": "<tag>", "data": { ... }}`. Keys are matched
//! case-insensitively by normalising them to snake_case before typed
//! deserialization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{EventKind, EventPayload};

/// Errors produced while turning a message into an envelope or payload
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed envelope JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("Envelope is not a JSON object")]
    NotAnObject,

    #[error("Envelope has an invalid shape: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("Envelope is missing event_type")]
    MissingEventType,

    #[error("Invalid data for {event_type}: {source}")]
    Payload {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Wire wrapper around a single event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Tag selecting the payload schema
    #[serde(default)]
    pub event_type: String,

    /// Tag-specific payload, left untyped until the tag is resolved
    #[serde(default)]
    pub data: Value,
}

impl EventEnvelope {
    /// Parse one message into an envelope
    ///
    /// Fails on malformed JSON, a non-object message, or a missing or blank
    /// `event_type`. An unknown tag is not a failure here.
    pub fn decode(message: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(message).map_err(DecodeError::Json)?;
        if !value.is_object() {
            return Err(DecodeError::NotAnObject);
        }

        let mut envelope: EventEnvelope = serde_json::from_value(normalize_keys(value)).map_err(DecodeError::Envelope)?;
        let trimmed = envelope.event_type.trim();
        if trimmed.is_empty() {
            return Err(DecodeError::MissingEventType);
        }
        if trimmed.len() != envelope.event_type.len() {
            envelope.event_type = trimmed.to_string();
        }
        Ok(envelope)
    }

    /// Wrap a typed payload for sending
    pub fn from_payload(payload: &EventPayload) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: payload.kind().tag().to_string(),
            data: payload.to_value()?,
        })
    }

    /// Resolve the tag against the registry
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_tag(&self.event_type)
    }

    /// Serialize as one newline-terminated wire line
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Rewrite the keys of a JSON object to snake_case; other values pass through
pub(crate) fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let normalized: Map<String, Value> = map.into_iter().map(|(key, value)| (to_snake_case(&key), value)).collect();
            Value::Object(normalized)
        }
        other => other,
    }
}

/// `InstanceName`, `instanceName`, `INSTANCE_NAME` and `instance-name` all
/// become `instance_name`
pub(crate) fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev: Option<char> = None;
    for ch in key.trim().chars() {
        if ch.is_uppercase() {
            if prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else if ch == '-' || ch == ' ' {
            out.push('_');
        } else {
            out.push(ch);
        }
        prev = Some(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::{InstanceStarted, LifecycleManager};

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("instance_name"), "instance_name");
        assert_eq!(to_snake_case("InstanceName"), "instance_name");
        assert_eq!(to_snake_case("instanceName"), "instance_name");
        assert_eq!(to_snake_case("INSTANCE_NAME"), "instance_name");
        assert_eq!(to_snake_case("Instance_Name"), "instance_name");
        assert_eq!(to_snake_case("instance-name"), "instance_name");
        assert_eq!(to_snake_case("EventType"), "event_type");
        assert_eq!(to_snake_case("data"), "data");
    }

    #[test]
    fn test_decode_valid_envelope() {
        let envelope =
            EventEnvelope::decode(r#"{"event_type":"instance_started","data":{"instance_name":"factorio-1"}}"#).unwrap();
        assert_eq!(envelope.event_type, "instance_started");
        assert_eq!(envelope.kind(), Some(EventKind::InstanceStarted));
        assert_eq!(envelope.data["instance_name"], "factorio-1");
    }

    #[test]
    fn test_decode_envelope_keys_case_insensitive() {
        let envelope = EventEnvelope::decode(r#"{"EventType":"instance_removed","Data":{"x":1}}"#).unwrap();
        assert_eq!(envelope.event_type, "instance_removed");
        assert_eq!(envelope.data["x"], 1);
    }

    #[test]
    fn test_decode_unknown_tag_is_accepted() {
        let envelope = EventEnvelope::decode(r#"{"event_type":"bogus_tag","data":{}}"#).unwrap();
        assert_eq!(envelope.event_type, "bogus_tag");
        assert_eq!(envelope.kind(), None);
    }

    #[test]
    fn test_decode_missing_data_is_null() {
        let envelope = EventEnvelope::decode(r#"{"event_type":"instance_removed"}"#).unwrap();
        assert!(envelope.data.is_null());
    }

    #[test]
    fn test_decode_trims_event_type() {
        let envelope = EventEnvelope::decode(r#"{"event_type":"  instance_removed ","data":{}}"#).unwrap();
        assert_eq!(envelope.event_type, "instance_removed");
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = EventEnvelope::decode(r#"{"event_type":"instance_started""#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_decode_not_an_object() {
        assert!(matches!(EventEnvelope::decode("[1,2,3]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(EventEnvelope::decode("\"hello\""), Err(DecodeError::NotAnObject)));
    }

    #[test]
    fn test_decode_missing_or_blank_event_type() {
        assert!(matches!(
            EventEnvelope::decode(r#"{"data":{}}"#),
            Err(DecodeError::MissingEventType)
        ));
        assert!(matches!(
            EventEnvelope::decode(r#"{"event_type":"   ","data":{}}"#),
            Err(DecodeError::MissingEventType)
        ));
    }

    #[test]
    fn test_decode_non_string_event_type() {
        let err = EventEnvelope::decode(r#"{"event_type":42,"data":{}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Envelope(_)));
    }

    #[test]
    fn test_from_payload_to_line() {
        let payload = EventPayload::from(InstanceStarted {
            instance_name: "factorio-1".to_string(),
            lifecycle_manager: LifecycleManager::Systemd,
        });
        let line = EventEnvelope::from_payload(&payload).unwrap().to_line().unwrap();

        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let decoded = EventEnvelope::decode(line.trim_end()).unwrap();
        assert_eq!(decoded.event_type, "instance_started");
        assert_eq!(decoded.data["lifecycle_manager"], "systemd");
    }
}
