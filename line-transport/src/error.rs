//! Error types for the transport layer.

use std::io;
use std::path::PathBuf;

/// Errors raised while opening or using a line transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The configured executable does not exist
    #[error("Executable not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The process could not be launched
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        /// Program that failed to start
        program: String,
        #[source]
        source: io::Error,
    },

    /// The TCP peer could not be reached
    #[error("Failed to connect to {address}: {source}")]
    ConnectFailed {
        /// Host and port that were dialed
        address: String,
        #[source]
        source: io::Error,
    },

    /// Read or write failure on an open stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport was closed before the operation
    #[error("Transport is closed")]
    Closed,
}

impl TransportError {
    /// Whether this error happened while opening the transport.
    ///
    /// Open failures are configuration problems (missing binary, unreachable
    /// host); everything else is a communication failure on a live stream.
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            TransportError::NotFound(_)
                | TransportError::SpawnFailed { .. }
                | TransportError::ConnectFailed { .. }
        )
    }
}

/// Convenience Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
