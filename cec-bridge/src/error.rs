use bridge_session::SessionError;
use cec_protocol::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Whether retrying with the same configuration is pointless.
    pub fn is_configuration(&self) -> bool {
        match self {
            BridgeError::Config(_) | BridgeError::Json(_) => true,
            BridgeError::Protocol(ProtocolError::InvalidPattern { .. }) => true,
            BridgeError::Session(SessionError::Configuration(_)) => true,
            BridgeError::Session(SessionError::Transport(e)) => e.is_open_failure(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
