//! Transport error types

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced while binding the listener or publishing to it
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Socket directory does not exist for {path}")]
    MissingParent { path: PathBuf },

    #[error("Socket {path} is already in use by a live listener")]
    InUse { path: PathBuf },

    #[error("Path {path} exists and is not a socket")]
    NotSocket { path: PathBuf },

    #[error("Failed to read metadata for {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove stale socket {path}: {source}")]
    StaleCleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to bind socket {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Timed out after {timeout:?} talking to {path}")]
    Timeout { path: PathBuf, timeout: Duration },

    #[error("Failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl TransportError {
    /// Whether this error came from binding the listening socket
    pub fn is_bind_error(&self) -> bool {
        matches!(
            self,
            TransportError::MissingParent { .. }
                | TransportError::InUse { .. }
                | TransportError::NotSocket { .. }
                | TransportError::Metadata { .. }
                | TransportError::StaleCleanup { .. }
                | TransportError::Bind { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_use_message() {
        let err = TransportError::InUse {
            path: PathBuf::from("/run/kgsm/kgsm.sock"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/run/kgsm/kgsm.sock"));
        assert!(msg.contains("in use"));
        assert!(err.is_bind_error());
    }

    #[test]
    fn test_publish_errors_are_not_bind_errors() {
        let err = TransportError::Timeout {
            path: PathBuf::from("/tmp/x.sock"),
            timeout: Duration::from_secs(5),
        };
        assert!(!err.is_bind_error());
    }
}
