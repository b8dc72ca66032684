//! Line classification for the cec-client protocol
//!
//! Classification is pure: it looks at one line plus whether the local
//! address is already known, and says what the reader should do with it.
//! All session state lives with the caller.

use crate::address::LogicalAddress;
use crate::command::CecCommand;
use crate::discovery::{self, DiscoveryScan};
use crate::error::Result;
use crate::event::Event;
use crate::patterns::{LineMatch, PatternSet};

pub const CONNECTION_OPENED: &str = "connection opened";
pub const COMMUNICATION_ENDED: &str = "communication thread ended";
pub const COULD_NOT_START: &str = "could not start CEC communications";
pub const WAITING_FOR_INPUT: &str = "waiting for input";
pub const SELF_ADDRESS_MARKER: &str = "Addresses controlled by libCEC:";
pub const DISCOVERY_TRIGGER: &str = "requesting CEC bus information";
pub const DISCOVERY_TERMINATOR: &str = "currently active source";

/// What the reader should do with a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The peer reported the CEC link state. `online == false` ends the session.
    ConnectionStatus { online: bool, reason: String },
    /// Write this command back to the peer
    Respond(String),
    SelfAddress(LogicalAddress),
    /// Switch to discovery capture until the terminator or the timeout
    BeginCapture,
    Event(Event),
    /// Echoed outbound or inbound frame, dropped
    Echo,
    Ignored,
}

/// Protocol knowledge the session reader needs.
///
/// The session layer is protocol-agnostic; anything that can classify lines,
/// detect the end of a discovery dump and segment it can drive it.
pub trait LineClassifier: Send + Sync {
    /// Classify one inbound line.
    fn classify(&self, line: &str, self_address_known: bool) -> Classification;

    /// Whether `line` terminates a discovery capture.
    fn ends_capture(&self, line: &str) -> bool;

    /// Turn a finished capture into device records.
    fn segment(&self, lines: &[String], terminated: bool) -> DiscoveryScan;

    /// Command that asks the peer for its device inventory.
    fn scan_command(&self) -> String;

    /// Command written during orderly shutdown, if any.
    fn quit_command(&self) -> Option<String>;
}

/// [`LineClassifier`] for `cec-client` output.
#[derive(Debug, Clone)]
pub struct CecClassifier {
    patterns: PatternSet,
}

impl CecClassifier {
    pub fn new(patterns: PatternSet) -> Self {
        Self { patterns }
    }

    /// Classifier with the built-in patterns.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(PatternSet::defaults()?))
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }
}

impl LineClassifier for CecClassifier {
    fn classify(&self, line: &str, self_address_known: bool) -> Classification {
        if line.contains(CONNECTION_OPENED) {
            return Classification::ConnectionStatus {
                online: true,
                reason: CONNECTION_OPENED.to_string(),
            };
        }
        for marker in [COMMUNICATION_ENDED, COULD_NOT_START] {
            if line.contains(marker) {
                return Classification::ConnectionStatus {
                    online: false,
                    reason: marker.to_string(),
                };
            }
        }
        if line.contains(WAITING_FOR_INPUT) && !self_address_known {
            return Classification::Respond(CecCommand::SelfAddress.to_string());
        }
        if line.contains(SELF_ADDRESS_MARKER) {
            return match self.patterns.self_address(line) {
                Some(address) => Classification::SelfAddress(address),
                None => {
                    tracing::debug!("self-address line without an address: {}", line);
                    Classification::Ignored
                }
            };
        }
        if line.contains(DISCOVERY_TRIGGER) {
            return Classification::BeginCapture;
        }

        match self.patterns.match_line(line) {
            LineMatch::Event(event) => Classification::Event(event),
            LineMatch::Echo => Classification::Echo,
            LineMatch::Unmatched => Classification::Ignored,
        }
    }

    fn ends_capture(&self, line: &str) -> bool {
        line.contains(DISCOVERY_TERMINATOR)
    }

    fn segment(&self, lines: &[String], terminated: bool) -> DiscoveryScan {
        discovery::segment(&self.patterns, lines, terminated)
    }

    fn scan_command(&self) -> String {
        CecCommand::Scan.to_string()
    }

    fn quit_command(&self) -> Option<String> {
        Some(CecCommand::Quit.to_string())
    }
}
