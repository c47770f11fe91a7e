//! HandlerRegistry - one async handler per event kind

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use eyre::eyre;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::events::{Event, EventKind, EventPayload};

/// Future returned by an erased handler
pub type HandlerFuture = BoxFuture<'static, eyre::Result<()>>;

type ErasedHandler = Arc<dyn Fn(EventPayload) -> HandlerFuture + Send + Sync>;

/// What happened to a dispatched payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No handler registered for the payload's kind
    NoHandler,
    /// Handler ran to completion
    Handled,
    /// Handler returned an error
    Failed(String),
    /// Handler panicked
    Panicked(String),
}

impl DispatchOutcome {
    /// Whether a handler ran without error
    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled)
    }
}

/// Maps each event kind to its single handler
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<EventKind, ErasedHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<EventKind> = self.read().keys().copied().collect();
        kinds.sort();
        f.debug_struct("HandlerRegistry").field("kinds", &kinds).finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler for `E`, replacing any existing one
    ///
    /// Returns true if a previous handler was replaced.
    pub fn register<E, F, Fut>(&self, handler: F) -> bool
    where
        E: Event,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        let erased: ErasedHandler = Arc::new(move |payload: EventPayload| -> HandlerFuture {
            match E::from_payload(payload) {
                Some(event) => handler(event).boxed(),
                None => futures::future::ready(Err(eyre!("payload routed to the {} handler", E::KIND.name()))).boxed(),
            }
        });
        self.insert(E::KIND, erased)
    }

    /// Register a handler that receives the erased payload for `kind`
    pub fn register_kind<F, Fut>(&self, kind: EventKind, handler: F) -> bool
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        let erased: ErasedHandler = Arc::new(move |payload: EventPayload| -> HandlerFuture { handler(payload).boxed() });
        self.insert(kind, erased)
    }

    fn insert(&self, kind: EventKind, handler: ErasedHandler) -> bool {
        let replaced = self.write().insert(kind, handler).is_some();
        if replaced {
            debug!(event_type = kind.tag(), "HandlerRegistry::insert: replaced existing handler");
        } else {
            debug!(event_type = kind.tag(), "HandlerRegistry::insert: registered handler");
        }
        replaced
    }

    /// Remove the handler for `kind`; returns true if one was registered
    pub fn unregister(&self, kind: EventKind) -> bool {
        debug!(event_type = kind.tag(), "HandlerRegistry::unregister: called");
        self.write().remove(&kind).is_some()
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.read().contains_key(&kind)
    }

    /// Number of kinds with a handler
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Run the handler for the payload's kind and wait for it
    ///
    /// Handler errors and panics are logged and reported in the outcome;
    /// they never propagate to the caller.
    pub async fn dispatch(&self, payload: EventPayload) -> DispatchOutcome {
        let kind = payload.kind();
        let handler = self.read().get(&kind).cloned();

        let Some(handler) = handler else {
            debug!(event_type = kind.tag(), "HandlerRegistry::dispatch: no handler registered");
            return DispatchOutcome::NoHandler;
        };

        debug!(
            event_type = kind.tag(),
            instance = payload.instance_name(),
            "HandlerRegistry::dispatch: invoking handler"
        );
        let invocation = async move { handler(payload).await };

        match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(Ok(())) => DispatchOutcome::Handled,
            Ok(Err(e)) => {
                let message = format!("{e:#}");
                warn!(event_type = kind.tag(), error = %message, "Event handler failed");
                DispatchOutcome::Failed(message)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(event_type = kind.tag(), panic = %message, "Event handler panicked");
                DispatchOutcome::Panicked(message)
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<EventKind, ErasedHandler>> {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<EventKind, ErasedHandler>> {
        self.handlers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
