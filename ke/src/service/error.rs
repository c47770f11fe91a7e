//! Event service error types

use thiserror::Error;

use super::LifecycleState;
use crate::transport::TransportError;

/// Errors reported synchronously by [`EventService`](super::EventService)
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Cannot {operation}: event service is already {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    #[error("Event service has been disposed")]
    Disposed,

    #[error("No Tokio runtime available to run the listener")]
    NoRuntime,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ServiceError {
    /// Whether the call violated the service's lifecycle contract
    pub fn is_invalid_operation(&self) -> bool {
        matches!(
            self,
            ServiceError::InvalidState { .. } | ServiceError::Disposed | ServiceError::NoRuntime
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_invalid_state_message() {
        let err = ServiceError::InvalidState {
            operation: "initialize",
            state: LifecycleState::Listening,
        };
        assert_eq!(err.to_string(), "Cannot initialize: event service is already listening");
        assert!(err.is_invalid_operation());
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let err = ServiceError::from(TransportError::InUse {
            path: PathBuf::from("/tmp/kgsm.sock"),
        });
        assert!(err.to_string().contains("already in use"));
        assert!(!err.is_invalid_operation());
    }
}
