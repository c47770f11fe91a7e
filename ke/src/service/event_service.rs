//! EventService - application-facing API of the event subsystem

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{EventPipeline, LifecycleState, ServiceError};
use crate::config::Config;
use crate::dispatch::HandlerRegistry;
use crate::events::{Event, EventKind, EventPayload};
use crate::transport::{ListenerOptions, SocketTransport};

#[derive(Debug, Default)]
struct Inner {
    state: LifecycleState,
    transport: Option<Arc<SocketTransport>>,
    task: Option<JoinHandle<()>>,
}

/// Listens on a Unix socket and routes KGSM events to registered handlers
///
/// Handlers can be registered before or while listening. Events are processed
/// one at a time on a single background task, in the order they arrive.
///
/// ```ignore
/// let service = EventService::new("/run/kgsm/kgsm.sock");
/// service.register_handler(|event: InstanceStarted| async move {
///     println!("{} started", event.instance_name);
///     Ok(())
/// })?;
/// service.initialize()?;
/// // ...
/// service.dispose().await;
/// ```
#[derive(Debug)]
pub struct EventService {
    socket_path: PathBuf,
    options: ListenerOptions,
    handlers: Arc<HandlerRegistry>,
    token: CancellationToken,
    inner: Mutex<Inner>,
}

impl EventService {
    /// Create a service for `socket_path` with default listener options
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self::with_options(socket_path, ListenerOptions::default())
    }

    pub fn with_options(socket_path: impl Into<PathBuf>, options: ListenerOptions) -> Self {
        let socket_path = socket_path.into();
        debug!(?socket_path, ?options, "EventService::with_options: called");
        Self {
            socket_path,
            options,
            handlers: Arc::new(HandlerRegistry::new()),
            token: CancellationToken::new(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Create a service from the socket path and limits in `config`
    pub fn from_config(config: &Config) -> Self {
        Self::with_options(&config.socket_path, config.listener_options())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn state(&self) -> LifecycleState {
        self.lock().state
    }

    /// Bind the socket and start the background listener
    ///
    /// Returns once the socket is bound; bind failures are reported here and
    /// leave the service in `Created` so the caller may retry. Valid only
    /// once, and only from within a Tokio runtime.
    ///
    /// Probing a socket file left at the path connects to it synchronously,
    /// so this may block briefly if a live listener there is not accepting.
    pub fn initialize(&self) -> Result<(), ServiceError> {
        debug!(socket_path = ?self.socket_path, "EventService::initialize: called");
        let mut inner = self.lock();
        match inner.state {
            LifecycleState::Created => {}
            state if state.is_disposed() => return Err(ServiceError::Disposed),
            state => {
                return Err(ServiceError::InvalidState {
                    operation: "initialize",
                    state,
                });
            }
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ServiceError::NoRuntime)?;
        let transport = Arc::new(SocketTransport::bind(&self.socket_path, self.options)?);

        let listener = transport.clone();
        let pipeline = EventPipeline::new(self.handlers.clone());
        let token = self.token.clone();
        let task = runtime.spawn(async move {
            listener.listen(&token, &pipeline).await;
            listener.close();
        });

        inner.transport = Some(transport);
        inner.task = Some(task);
        inner.state = LifecycleState::Listening;
        info!(path = %self.socket_path.display(), "Event service listening");
        Ok(())
    }

    /// Register the handler for events of type `E`
    ///
    /// Replaces any handler already registered for `E`. Fails once the
    /// service has been disposed.
    pub fn register_handler<E, F, Fut>(&self, handler: F) -> Result<(), ServiceError>
    where
        E: Event,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        debug!(event_type = E::KIND.tag(), "EventService::register_handler: called");
        self.ensure_not_disposed()?;
        self.handlers.register::<E, F, Fut>(handler);
        Ok(())
    }

    /// Register a handler for `kind` that receives the erased payload
    pub fn register_kind_handler<F, Fut>(&self, kind: EventKind, handler: F) -> Result<(), ServiceError>
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        debug!(event_type = kind.tag(), "EventService::register_kind_handler: called");
        self.ensure_not_disposed()?;
        self.handlers.register_kind(kind, handler);
        Ok(())
    }

    /// Whether a handler is registered for `kind`
    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.handlers.is_registered(kind)
    }

    /// Stop listening, remove the socket file and wait for the listener task
    ///
    /// Safe to call any number of times; only the first call does anything.
    /// The service reaches `Stopped` even if this future is dropped before it
    /// completes. Called from a handler, it does not wait for the listener
    /// task that is running that handler.
    pub async fn dispose(&self) {
        debug!("EventService::dispose: called");
        let (guard, task) = {
            let mut inner = self.lock();
            if inner.state.is_disposed() {
                debug!(state = %inner.state, "EventService::dispose: already disposed");
                return;
            }
            inner.state = LifecycleState::Cancelling;
            let guard = StopGuard {
                service: self,
                transport: inner.transport.take(),
            };
            (guard, inner.task.take())
        };

        self.token.cancel();

        if let Some(task) = task {
            if tokio::task::try_id() == Some(task.id()) {
                debug!("EventService::dispose: called from the listener task, not joining it");
            } else if let Err(e) = task.await {
                warn!(error = %e, "Event listener task ended abnormally");
            }
        }

        drop(guard);
    }

    fn ensure_not_disposed(&self) -> Result<(), ServiceError> {
        if self.lock().state.is_disposed() {
            return Err(ServiceError::Disposed);
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Finishes a dispose: closes the transport and marks the service stopped
struct StopGuard<'a> {
    service: &'a EventService,
    transport: Option<Arc<SocketTransport>>,
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
        self.service.lock().state = LifecycleState::Stopped;
        info!(path = %self.service.socket_path.display(), "Event service stopped");
    }
}

impl Drop for EventService {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if inner.state.is_disposed() && inner.transport.is_none() {
            return;
        }
        debug!("EventService::drop: cancelling listener");
        self.token.cancel();
        if let Some(transport) = inner.transport.take() {
            transport.close();
        }
        inner.state = LifecycleState::Stopped;
    }
}
