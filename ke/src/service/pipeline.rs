//! Message pipeline: decode, then dispatch

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::dispatch::{DispatchOutcome, HandlerRegistry};
use crate::events::{DecodedMessage, decode_message};
use crate::transport::MessageSink;

/// What became of one raw message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Decoded and handed to the dispatcher
    Dispatched(DispatchOutcome),
    /// Well-formed envelope with a tag this build does not know
    UnknownTag(String),
    /// Not a valid envelope or payload; dropped
    Malformed(String),
}

/// Sink that turns raw messages into handler calls
///
/// Nothing that goes wrong here reaches the listener loop: protocol errors are
/// logged and the message dropped, handler failures are contained by the
/// registry.
#[derive(Debug, Clone)]
pub struct EventPipeline {
    handlers: Arc<HandlerRegistry>,
}

impl EventPipeline {
    pub fn new(handlers: Arc<HandlerRegistry>) -> Self {
        Self { handlers }
    }

    /// Decode one message and run its handler to completion
    pub async fn process(&self, message: &str) -> MessageOutcome {
        match decode_message(message) {
            Ok(DecodedMessage::Event(payload)) => {
                debug!(
                    event_type = payload.kind().tag(),
                    instance = payload.instance_name(),
                    "EventPipeline::process: decoded event"
                );
                MessageOutcome::Dispatched(self.handlers.dispatch(payload).await)
            }
            Ok(DecodedMessage::Unknown { event_type }) => {
                warn!(%event_type, "Unknown event type, ignoring message");
                MessageOutcome::UnknownTag(event_type)
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed event message");
                MessageOutcome::Malformed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl MessageSink for EventPipeline {
    async fn on_message(&self, message: String) {
        self.process(&message).await;
    }
}
