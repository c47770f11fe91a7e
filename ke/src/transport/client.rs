//! Event publisher client
//!
//! Plays the producer side of the socket: connects and writes one envelope per
//! line. KGSM itself is the usual producer; this client backs `ke emit` and
//! the end-to-end tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tracing::debug;

use super::TransportError;
use crate::events::{EventEnvelope, EventPayload};

/// Default timeout for connect and write
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for publishing events to a listening socket
#[derive(Debug, Clone)]
pub struct EventPublisher {
    socket_path: PathBuf,
    timeout: Duration,
}

impl EventPublisher {
    /// Create a publisher for the socket at `socket_path`
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path this publisher connects to
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Check if the socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Open a connection for sending several messages
    pub async fn connect(&self) -> Result<PublisherConnection, TransportError> {
        debug!(socket_path = ?self.socket_path, "EventPublisher::connect: called");
        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| TransportError::Timeout {
                path: self.socket_path.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| TransportError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;

        Ok(PublisherConnection {
            stream,
            path: self.socket_path.clone(),
            timeout: self.timeout,
        })
    }

    /// Publish a single event on a fresh connection
    pub async fn publish(&self, payload: &EventPayload) -> Result<(), TransportError> {
        let envelope = EventEnvelope::from_payload(payload)?;
        self.publish_envelope(&envelope).await
    }

    /// Publish a single envelope on a fresh connection
    pub async fn publish_envelope(&self, envelope: &EventEnvelope) -> Result<(), TransportError> {
        debug!(event_type = %envelope.event_type, "EventPublisher::publish_envelope: called");
        let mut connection = self.connect().await?;
        connection.send_envelope(envelope).await?;
        connection.close().await
    }
}

/// An open producer connection
#[derive(Debug)]
pub struct PublisherConnection {
    stream: UnixStream,
    path: PathBuf,
    timeout: Duration,
}

impl PublisherConnection {
    /// Send a typed event as one envelope line
    pub async fn send(&mut self, payload: &EventPayload) -> Result<(), TransportError> {
        let envelope = EventEnvelope::from_payload(payload)?;
        self.send_envelope(&envelope).await
    }

    /// Send an envelope as one line
    pub async fn send_envelope(&mut self, envelope: &EventEnvelope) -> Result<(), TransportError> {
        let line = envelope.to_line()?;
        self.send_raw(line.as_bytes()).await
    }

    /// Write bytes as-is; framing is the caller's business
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        debug!(bytes = bytes.len(), "PublisherConnection::send_raw: called");
        let path = &self.path;
        let stream = &mut self.stream;
        tokio::time::timeout(self.timeout, async {
            stream.write_all(bytes).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| TransportError::Timeout {
            path: path.clone(),
            timeout: self.timeout,
        })?
        .map_err(|source| TransportError::Write {
            path: path.clone(),
            source,
        })
    }

    /// Shut down the write half so the listener sees end of stream
    pub async fn close(mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await.map_err(|source| TransportError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::UnixListener;

    use crate::events::{InstanceStarted, LifecycleManager};

    #[test]
    fn test_publisher_with_timeout() {
        let publisher = EventPublisher::new("/run/kgsm/kgsm.sock").with_timeout(Duration::from_secs(10));
        assert_eq!(publisher.timeout, Duration::from_secs(10));
        assert_eq!(publisher.socket_path(), Path::new("/run/kgsm/kgsm.sock"));
    }

    #[test]
    fn test_socket_exists_false() {
        let temp = TempDir::new().unwrap();
        let publisher = EventPublisher::new(temp.path().join("nonexistent.sock"));
        assert!(!publisher.socket_exists());
    }

    #[tokio::test]
    async fn test_publish_to_missing_socket_fails() {
        let temp = TempDir::new().unwrap();
        let publisher = EventPublisher::new(temp.path().join("nonexistent.sock"));
        let payload = EventPayload::from(InstanceStarted {
            instance_name: "factorio-1".to_string(),
            lifecycle_manager: LifecycleManager::Systemd,
        });

        let err = publisher.publish(&payload).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_publish_writes_one_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("kgsm.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            let first = lines.next_line().await.unwrap();
            let second = lines.next_line().await.unwrap();
            (first, second)
        });

        let payload = EventPayload::from(InstanceStarted {
            instance_name: "factorio-1".to_string(),
            lifecycle_manager: LifecycleManager::Systemd,
        });
        EventPublisher::new(&path).publish(&payload).await.unwrap();

        let (first, second) = server.await.unwrap();
        let line = first.expect("one line");
        let envelope = EventEnvelope::decode(&line).unwrap();
        assert_eq!(envelope.event_type, "instance_started");
        assert_eq!(envelope.data["instance_name"], "factorio-1");
        assert!(second.is_none(), "connection closes after one envelope");
    }
}
