//! Typed payload deserialization

use serde_json::Value;
use tracing::trace;

use super::envelope::{DecodeError, EventEnvelope, normalize_keys};
use super::types::{EventKind, EventPayload};

/// Result of decoding one wire message
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    /// Known tag with a valid payload
    Event(EventPayload),
    /// Well-formed envelope whose tag this build does not know
    Unknown { event_type: String },
}

/// Deserialize `data` into the payload schema for `kind`
///
/// Field names are matched case-insensitively. Missing `instance_name` (and
/// `lifecycle_manager` for start/stop) is an error; free-text detail fields
/// default to the empty string.
pub fn deserialize_payload(kind: EventKind, data: Value) -> Result<EventPayload, DecodeError> {
    trace!(event_type = kind.tag(), json = %data, "deserialize_payload: called");
    EventPayload::from_value(kind, normalize_keys(data)).map_err(|source| DecodeError::Payload {
        event_type: kind.tag(),
        source,
    })
}

/// Decode a raw message: envelope first, then the payload for known tags
pub fn decode_message(message: &str) -> Result<DecodedMessage, DecodeError> {
    let envelope = EventEnvelope::decode(message)?;
    match envelope.kind() {
        Some(kind) => deserialize_payload(kind, envelope.data).map(DecodedMessage::Event),
        None => Ok(DecodedMessage::Unknown {
            event_type: envelope.event_type,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::{
        InstanceBackupCreated, InstanceCreated, InstanceStarted, InstanceVersionUpdated, LifecycleManager,
    };
    use serde_json::json;

    #[test]
    fn test_deserialize_started() {
        let payload = deserialize_payload(
            EventKind::InstanceStarted,
            json!({"instance_name": "factorio-1", "lifecycle_manager": "systemd"}),
        )
        .unwrap();

        assert_eq!(
            payload,
            EventPayload::InstanceStarted(InstanceStarted {
                instance_name: "factorio-1".to_string(),
                lifecycle_manager: LifecycleManager::Systemd,
            })
        );
    }

    #[test]
    fn test_field_names_case_insensitive() {
        let payload = deserialize_payload(
            EventKind::InstanceVersionUpdated,
            json!({"InstanceName": "necesse", "OLD_VERSION": "1.0", "newVersion": "1.1"}),
        )
        .unwrap();

        assert_eq!(
            payload,
            EventPayload::InstanceVersionUpdated(InstanceVersionUpdated {
                instance_name: "necesse".to_string(),
                old_version: "1.0".to_string(),
                new_version: "1.1".to_string(),
            })
        );
    }

    #[test]
    fn test_enum_value_case_insensitive() {
        let payload = deserialize_payload(
            EventKind::InstanceStarted,
            json!({"instance_name": "terraria", "lifecycle_manager": "STANDALONE"}),
        )
        .unwrap();

        match payload {
            EventPayload::InstanceStarted(event) => assert_eq!(event.lifecycle_manager, LifecycleManager::Standalone),
            other => panic!("Expected InstanceStarted, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_instance_name_fails() {
        let err = deserialize_payload(EventKind::InstanceBackupCreated, json!({"source": "manual", "version": "3"}))
            .unwrap_err();
        match err {
            DecodeError::Payload { event_type, .. } => assert_eq!(event_type, "instance_backup_created"),
            other => panic!("Expected Payload error, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch_fails() {
        assert!(deserialize_payload(EventKind::InstanceRemoved, json!({"instance_name": 12})).is_err());
        assert!(deserialize_payload(EventKind::InstanceRemoved, json!(null)).is_err());
        assert!(deserialize_payload(EventKind::InstanceRemoved, json!("instance")).is_err());
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let payload = deserialize_payload(
            EventKind::InstanceCreated,
            json!({"instance_name": "valheim", "blueprint": "valheim.bp", "created_by": "admin"}),
        )
        .unwrap();
        assert_eq!(
            payload,
            EventPayload::InstanceCreated(InstanceCreated {
                instance_name: "valheim".to_string(),
                blueprint: "valheim.bp".to_string(),
            })
        );
    }

    #[test]
    fn test_backup_details_default_empty() {
        let payload = deserialize_payload(EventKind::InstanceBackupCreated, json!({"instance_name": "a"})).unwrap();
        assert_eq!(
            payload,
            EventPayload::InstanceBackupCreated(InstanceBackupCreated {
                instance_name: "a".to_string(),
                source: String::new(),
                version: String::new(),
            })
        );
    }

    #[test]
    fn test_decode_message_known_and_unknown() {
        let decoded =
            decode_message(r#"{"event_type":"instance_removed","data":{"instance_name":"factorio-1"}}"#).unwrap();
        assert!(matches!(decoded, DecodedMessage::Event(EventPayload::InstanceRemoved(_))));

        let decoded = decode_message(r#"{"event_type":"bogus_tag","data":{}}"#).unwrap();
        assert_eq!(
            decoded,
            DecodedMessage::Unknown {
                event_type: "bogus_tag".to_string()
            }
        );
    }

    #[test]
    fn test_decode_message_payload_error() {
        let err = decode_message(r#"{"event_type":"instance_stopped","data":{"instance_name":"x"}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Payload { .. }));
    }
}
