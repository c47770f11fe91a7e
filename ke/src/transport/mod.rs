//! Unix domain socket transport
//!
//! The listener side binds the configured socket path, accepts one producer
//! connection at a time and splits its byte stream into newline-delimited
//! messages. The publisher side connects and writes envelopes, one per line.

mod client;
mod error;
mod framing;
mod listener;

pub use client::{DEFAULT_TIMEOUT, EventPublisher, PublisherConnection};
pub use error::TransportError;
pub use framing::LineFramer;
pub use listener::{
    DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_READ_BUFFER_SIZE, ListenerOptions, MessageSink, SocketTransport, cleanup_socket,
};

const LISTENER_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::transport");
