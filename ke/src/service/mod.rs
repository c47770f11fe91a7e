//! Event Service - owns the listener and wires messages to handlers
//!
//! ```text
//!   EventService::initialize
//!        │ bind (sync, errors surface here)
//!        ▼
//!   SocketTransport::listen ──► EventPipeline ──► decode_message ──► HandlerRegistry::dispatch
//!        ▲
//!        └── CancellationToken, cancelled by dispose/drop
//! ```

mod error;
mod event_service;
mod pipeline;
mod state;

pub use error::ServiceError;
pub use event_service::EventService;
pub use pipeline::{EventPipeline, MessageOutcome};
pub use state::LifecycleState;
