//! Routing of decoded events to registered handlers
//!
//! Each [`EventKind`](crate::events::EventKind) has at most one handler.
//! Registering again for the same kind replaces the previous handler.

mod registry;

pub use registry::{DispatchOutcome, HandlerFuture, HandlerRegistry};
