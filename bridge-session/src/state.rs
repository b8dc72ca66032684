//! Session lifecycle and bridge status

use std::fmt;

/// Reader loop lifecycle.
///
/// `Stopped → Starting → Running → (Stopping | Faulted) → Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Faulted,
}

impl LoopState {
    /// States in which another `start` is refused.
    pub fn is_active(self) -> bool {
        matches!(self, LoopState::Starting | LoopState::Running | LoopState::Stopping)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Stopped => "stopped",
            LoopState::Starting => "starting",
            LoopState::Running => "running",
            LoopState::Stopping => "stopping",
            LoopState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Why a bridge is offline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfflineDetail {
    /// Orderly stop
    None,
    /// Missing executable, unreachable host; retrying will not help
    ConfigurationError,
    /// The connection failed after it was up
    CommunicationError,
}

/// Externally visible bridge status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeStatus {
    /// Never started
    Uninitialized,
    Online,
    Offline { detail: OfflineDetail, reason: String },
}

impl BridgeStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, BridgeStatus::Online)
    }

    pub(crate) fn offline(detail: OfflineDetail, reason: impl Into<String>) -> Self {
        BridgeStatus::Offline {
            detail,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(LoopState::Running.is_active());
        assert!(LoopState::Starting.is_active());
        assert!(LoopState::Stopping.is_active());
        assert!(!LoopState::Stopped.is_active());
        assert!(!LoopState::Faulted.is_active());
    }

    #[test]
    fn test_status() {
        assert!(BridgeStatus::Online.is_online());
        let offline = BridgeStatus::offline(OfflineDetail::CommunicationError, "end of stream");
        assert!(!offline.is_online());
        assert_eq!(
            offline,
            BridgeStatus::Offline {
                detail: OfflineDetail::CommunicationError,
                reason: "end of stream".to_string()
            }
        );
    }
}
