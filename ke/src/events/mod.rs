//! KGSM event vocabulary and decoding
//!
//! KGSM reports instance lifecycle changes as newline-delimited JSON envelopes
//! on a Unix socket. This module owns everything between a raw text message and
//! a typed payload:
//!
//! ```text
//!   "{\"event_type\":\"instance_started\",\"data\":{...}}"
//!                          │
//!                          ▼
//!                  EventEnvelope::decode      malformed / blank tag → DecodeError
//!                          │
//!                          ▼
//!                  EventKind::from_tag        unknown tag → DecodedMessage::Unknown
//!                          │
//!                          ▼
//!                  deserialize_payload        missing field → DecodeError::Payload
//!                          │
//!                          ▼
//!                    EventPayload::InstanceStarted(InstanceStarted { .. })
//! ```
//!
//! # Event Types
//!
//! See [`EventKind`] for the complete tag table. Payloads with extra fields:
//! - `InstanceCreated`, `InstanceInstallation*`, `InstanceInstalled`: `blueprint`
//! - `InstanceVersionUpdated`: `old_version`, `new_version`
//! - `InstanceStarted`, `InstanceStopped`: `lifecycle_manager`
//! - `InstanceBackupCreated`, `InstanceBackupRestored`: `source`, `version`

mod envelope;
mod payload;
mod registry;
mod types;

pub use envelope::{DecodeError, EventEnvelope};
pub use payload::{DecodedMessage, decode_message, deserialize_payload};
pub use registry::{UnknownTag, known_tags};
pub use types::*;
