//! Command sending handle

use std::sync::Arc;

use cec_protocol::{CecCommand, LogicalAddress};

use crate::error::Result;
use crate::session::Shared;
use crate::state::LoopState;

/// Clonable handle for writing commands to a session.
///
/// Each send is one line and reaches the peer intact even when several
/// threads send at once. Sends fail with
/// [`SessionError::NotConnected`](crate::SessionError::NotConnected) while
/// the session is not running; nothing is queued.
#[derive(Clone)]
pub struct CommandSender {
    shared: Arc<Shared>,
}

impl CommandSender {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Send a raw command line.
    pub fn send(&self, text: &str) -> Result<()> {
        self.shared.write(text)
    }

    pub fn send_command(&self, command: &CecCommand) -> Result<()> {
        self.shared.write(&command.to_string())
    }

    /// The bridge's own logical address, once the peer has told us.
    pub fn bridge_address(&self) -> Option<LogicalAddress> {
        self.shared.self_address()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state() == LoopState::Running
    }
}
