//! Hub Error Types

use thiserror::Error;

/// Errors surfaced by the hub facade.
///
/// Delivery problems (recipient offline, recipient too slow) are never
/// reported here; they are silent drops by contract.
#[derive(Debug, Error)]
pub enum HubError {
    /// The dispatcher task is gone, so the named queue no longer accepts work
    #[error("Dispatcher stopped: {0} queue is closed")]
    DispatcherStopped(&'static str),

    /// Payload could not be serialized before submission
    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for hub facade operations
pub type HubResult<T> = Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_stopped_message() {
        let err = HubError::DispatcherStopped("fanout");
        assert_eq!(err.to_string(), "Dispatcher stopped: fanout queue is closed");
    }
}
