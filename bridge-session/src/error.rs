//! Error types for bridge sessions

use std::time::Duration;

use cec_protocol::ProtocolError;
use line_transport::TransportError;

use crate::state::LoopState;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while running a bridge session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Opening the transport failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Invalid session configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `start` while the loop is not stopped
    #[error("Session is already {0}")]
    AlreadyRunning(LoopState),

    /// No live connection to write to
    #[error("Session is not connected")]
    NotConnected,

    /// The reader of a previous connection did not finish in time
    #[error("Previous reader still active after {0:?}")]
    PreviousSessionStillActive(Duration),

    /// A write to the live connection failed
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// No discovery result arrived in time
    #[error("Discovery timed out after {0:?}")]
    DiscoveryTimeout(Duration),

    /// Another discovery request is still waiting for its result
    #[error("Discovery already in progress")]
    DiscoveryInProgress,
}

impl SessionError {
    /// Map a failed write on a live transport.
    pub(crate) fn from_write(error: TransportError) -> Self {
        match error {
            TransportError::Io(e) => SessionError::Io(e),
            TransportError::Closed => SessionError::NotConnected,
            other => SessionError::Transport(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        assert_eq!(
            SessionError::AlreadyRunning(LoopState::Running).to_string(),
            "Session is already running"
        );
        assert_eq!(SessionError::NotConnected.to_string(), "Session is not connected");
        assert_eq!(
            SessionError::DiscoveryTimeout(Duration::from_secs(25)).to_string(),
            "Discovery timed out after 25s"
        );
    }

    #[test]
    fn test_write_error_mapping() {
        let io_error = TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(matches!(SessionError::from_write(io_error), SessionError::Io(_)));
        assert!(matches!(
            SessionError::from_write(TransportError::Closed),
            SessionError::NotConnected
        ));
    }
}
