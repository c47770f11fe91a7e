//! Unix socket listener for the KGSM event stream
//!
//! Accepts one producer connection at a time, frames its bytes into messages
//! and hands each message to a [`MessageSink`] before reading further. Accept
//! and read failures are logged and the loop keeps going; only cancellation
//! ends it.

use std::fs;
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::framing::LineFramer;
use super::{LISTENER_TARGET, TransportError};

/// Default size of the per-read buffer
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Default cap on a single framed message
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Tuning for how connections are read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Bytes requested per `read` call
    pub read_buffer_size: usize,
    /// Longest accepted message; longer lines are dropped
    pub max_message_bytes: usize,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// Receives framed messages from the listener, one at a time and in order
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Handle one message. The listener waits for this to finish before
    /// reading the next one.
    async fn on_message(&self, message: String);
}

/// A bound Unix socket that owns its socket file
///
/// The file is removed on [`close`](Self::close) or drop, whichever comes
/// first; closing twice is a no-op.
#[derive(Debug)]
pub struct SocketTransport {
    path: PathBuf,
    listener: UnixListener,
    options: ListenerOptions,
    closed: AtomicBool,
}

impl SocketTransport {
    /// Bind the socket at `path`
    ///
    /// The parent directory must exist. A leftover socket with no listener
    /// behind it is removed first; a live socket or a non-socket file at the
    /// path fails the bind. Must be called from within a Tokio runtime.
    ///
    /// Liveness is checked with a blocking connect, so this can block the
    /// calling thread while a live listener with a full backlog holds the
    /// path.
    pub fn bind(path: impl Into<PathBuf>, options: ListenerOptions) -> Result<Self, TransportError> {
        let path = path.into();
        debug!(target: LISTENER_TARGET, ?path, "SocketTransport::bind: called");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
            && !parent.is_dir()
        {
            return Err(TransportError::MissingParent { path });
        }

        remove_stale_socket(&path)?;

        let listener = UnixListener::bind(&path).map_err(|source| bind_error(&path, source))?;
        info!(target: LISTENER_TARGET, path = %path.display(), "Unix socket listener bound");

        Ok(Self {
            path,
            listener,
            options,
            closed: AtomicBool::new(false),
        })
    }

    /// Path of the socket file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether [`close`](Self::close) has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Accept and read connections until `token` is cancelled
    ///
    /// Connections are served strictly one after another. Cancellation while
    /// waiting to accept, waiting for bytes, or waiting on the sink returns
    /// normally.
    pub async fn listen(&self, token: &CancellationToken, sink: &dyn MessageSink) {
        info!(target: LISTENER_TARGET, path = %self.path.display(), "Unix socket listener started");

        loop {
            debug!(target: LISTENER_TARGET, "listen: waiting for connection");
            let accepted = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, _addr)) => {
                    debug!(target: LISTENER_TARGET, "listen: connection accepted");
                    self.read_connection(stream, token, sink).await;
                }
                Err(e) => {
                    warn!(target: LISTENER_TARGET, error = %e, "Failed to accept connection");
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
                    }
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        info!(target: LISTENER_TARGET, "Unix socket listener stopped");
    }

    async fn read_connection(&self, mut stream: UnixStream, token: &CancellationToken, sink: &dyn MessageSink) {
        let mut buffer = vec![0_u8; self.options.read_buffer_size.max(1)];
        let mut framer = LineFramer::new(self.options.max_message_bytes);

        loop {
            let read = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(target: LISTENER_TARGET, "read_connection: cancelled");
                    return;
                }
                read = stream.read(&mut buffer) => read,
            };

            match read {
                Ok(0) => {
                    if let Some(message) = framer.finish() {
                        deliver(message, token, sink).await;
                    }
                    debug!(target: LISTENER_TARGET, "read_connection: connection closed");
                    return;
                }
                Ok(n) => {
                    for message in framer.push(&buffer[..n]) {
                        if !deliver(message, token, sink).await {
                            return;
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(target: LISTENER_TARGET, error = %e, "Error reading from connection");
                    return;
                }
            }
        }
    }

    /// Remove the socket file; safe to call more than once
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(target: LISTENER_TARGET, path = ?self.path, "SocketTransport::close: removing socket file");
        cleanup_socket(&self.path);
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pass one message to the sink; false if cancelled before it finished
async fn deliver(message: String, token: &CancellationToken, sink: &dyn MessageSink) -> bool {
    debug!(target: LISTENER_TARGET, bytes = message.len(), "Received message");
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = sink.on_message(message) => true,
    }
}

fn remove_stale_socket(path: &Path) -> Result<(), TransportError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(TransportError::Metadata {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if !metadata.file_type().is_socket() {
        return Err(TransportError::NotSocket {
            path: path.to_path_buf(),
        });
    }

    match StdUnixStream::connect(path) {
        Ok(_probe) => Err(TransportError::InUse {
            path: path.to_path_buf(),
        }),
        Err(e) if matches!(e.kind(), io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound) => {
            remove_if_unchanged(path, &metadata)
        }
        Err(source) => Err(TransportError::Connect {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Remove the stale socket only if the path still holds the file that was probed
///
/// Another listener may have replaced the file between the probe and here;
/// that file is live and is left alone.
fn remove_if_unchanged(path: &Path, probed: &fs::Metadata) -> Result<(), TransportError> {
    match fs::symlink_metadata(path) {
        Ok(current) if current.dev() == probed.dev() && current.ino() == probed.ino() => {}
        Ok(_) => {
            return Err(TransportError::InUse {
                path: path.to_path_buf(),
            });
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(TransportError::Metadata {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    debug!(target: LISTENER_TARGET, ?path, "remove_stale_socket: removing stale socket");
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(TransportError::StaleCleanup {
            path: path.to_path_buf(),
            source: e,
        }),
        _ => Ok(()),
    }
}

fn bind_error(path: &Path, source: io::Error) -> TransportError {
    if source.kind() == io::ErrorKind::AddrInUse {
        TransportError::InUse {
            path: path.to_path_buf(),
        }
    } else {
        TransportError::Bind {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Remove a socket file if present, logging anything but "not found"
pub fn cleanup_socket(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!(target: LISTENER_TARGET, path = %path.display(), error = %e, "Failed to remove socket file");
    }
}
