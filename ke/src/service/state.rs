//! Listener lifecycle state

use std::fmt;

/// Where an [`EventService`](super::EventService) is in its lifecycle
///
/// `Created → Listening → Cancelling → Stopped`. A service never goes back to
/// an earlier state; once stopped it must be replaced, not restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Created,
    Listening,
    Cancelling,
    Stopped,
}

impl LifecycleState {
    /// Whether dispose has started
    pub fn is_disposed(self) -> bool {
        matches!(self, LifecycleState::Cancelling | LifecycleState::Stopped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Created => "created",
            LifecycleState::Listening => "listening",
            LifecycleState::Cancelling => "cancelling",
            LifecycleState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_created() {
        assert_eq!(LifecycleState::default(), LifecycleState::Created);
    }

    #[test]
    fn test_is_disposed() {
        assert!(!LifecycleState::Created.is_disposed());
        assert!(!LifecycleState::Listening.is_disposed());
        assert!(LifecycleState::Cancelling.is_disposed());
        assert!(LifecycleState::Stopped.is_disposed());
    }

    #[test]
    fn test_display() {
        assert_eq!(LifecycleState::Listening.to_string(), "listening");
    }
}
