//! kgsm-events - typed KGSM instance events over a Unix socket
//!
//! KGSM announces lifecycle changes of the game server instances it manages
//! (created, installed, started, stopped, backed up, removed, ...) as
//! newline-delimited JSON envelopes written to a Unix domain socket. This
//! crate listens on that socket, decodes each envelope into a typed event and
//! hands it to the handler registered for its type.
//!
//! # Modules
//!
//! - [`events`] - event vocabulary, envelope decoding, payload types
//! - [`transport`] - socket listener, line framing, publisher client
//! - [`dispatch`] - handler registry and dispatcher
//! - [`service`] - [`EventService`], the lifecycle-managed entry point
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface of the `ke` binary

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod service;
pub mod transport;

pub use config::Config;
pub use dispatch::{DispatchOutcome, HandlerRegistry};
pub use events::{
    DecodeError, DecodedMessage, Event, EventEnvelope, EventKind, EventPayload, LifecycleManager, decode_message,
};
pub use service::{EventService, LifecycleState, ServiceError};
pub use transport::{EventPublisher, ListenerOptions, SocketTransport, TransportError};
