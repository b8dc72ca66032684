//! Equipment handles
//!
//! An [`Equipment`] is one CEC device behind the bridge, addressed by its
//! logical index and physical address. It issues commands through the
//! bridge's sender and keeps a small state record fed by the events that
//! name its index.

use std::sync::Arc;

use bridge_session::{BridgeConsumer, CommandSender, ConsumerId};
use cec_protocol::{CecCommand, Event, LogicalAddress, PhysicalAddress, RemoteButton};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::Result;

/// Last known state of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentSnapshot {
    pub index: LogicalAddress,
    pub address: PhysicalAddress,
    /// Follows the bridge connection
    pub online: bool,
    /// Why the bridge went offline, if it did
    pub status: Option<String>,
    /// `None` until a power transition was seen
    pub power: Option<bool>,
    pub active_source: Option<bool>,
    /// Text of the most recent generic event
    pub last_event: Option<String>,
}

/// Per-device state, updated from the bridge's event stream.
pub struct EquipmentState {
    snapshot: RwLock<EquipmentSnapshot>,
}

impl EquipmentState {
    pub(crate) fn new(index: LogicalAddress, address: PhysicalAddress, online: bool) -> Self {
        Self {
            snapshot: RwLock::new(EquipmentSnapshot {
                index,
                address,
                online,
                status: None,
                power: None,
                active_source: None,
                last_event: None,
            }),
        }
    }

    pub fn snapshot(&self) -> EquipmentSnapshot {
        self.snapshot.read().clone()
    }
}

impl BridgeConsumer for EquipmentState {
    fn on_event(&self, event: &Event) {
        let mut snapshot = self.snapshot.write();
        if event.device() != Some(snapshot.index) {
            return;
        }
        match event {
            Event::PowerOn { .. } => snapshot.power = Some(true),
            Event::PowerOff { .. } => snapshot.power = Some(false),
            Event::ActiveSourceOn { .. } => snapshot.active_source = Some(true),
            Event::ActiveSourceOff { .. } => snapshot.active_source = Some(false),
            Event::Raw { text, .. } => snapshot.last_event = Some(text.clone()),
            Event::ConnectionStatus { .. } => {}
        }
        tracing::trace!(index = %snapshot.index, kind = event.kind(), "Equipment state updated");
    }

    fn on_connection_status(&self, online: bool, reason: &str) {
        let mut snapshot = self.snapshot.write();
        snapshot.online = online;
        snapshot.status = if online { None } else { Some(reason.to_string()) };
        tracing::debug!(index = %snapshot.index, online, reason, "Equipment status");
    }
}

/// Command issuer and state view for one device
///
/// Cheap to clone. Commands go out immediately; state changes arrive later
/// through the event stream once the device reports them.
///
/// # Example
///
/// ```rust,ignore
/// let tv = bridge.add_equipment("0".parse()?, "0.0.0.0".parse()?);
/// tv.power_on()?;
/// tv.press_remote_button(RemoteButton::VolumeUp)?;
///
/// let snapshot = tv.snapshot();
/// println!("{:?}", snapshot.power);
/// ```
#[derive(Clone)]
pub struct Equipment {
    index: LogicalAddress,
    address: PhysicalAddress,
    sender: CommandSender,
    state: Arc<EquipmentState>,
    consumer_id: ConsumerId,
}

impl Equipment {
    pub(crate) fn new(
        index: LogicalAddress,
        address: PhysicalAddress,
        sender: CommandSender,
        state: Arc<EquipmentState>,
        consumer_id: ConsumerId,
    ) -> Self {
        Self {
            index,
            address,
            sender,
            state,
            consumer_id,
        }
    }

    pub fn index(&self) -> LogicalAddress {
        self.index
    }

    pub fn address(&self) -> PhysicalAddress {
        self.address
    }

    pub(crate) fn consumer_id(&self) -> ConsumerId {
        self.consumer_id
    }

    pub fn power_on(&self) -> Result<()> {
        self.send(CecCommand::PowerOn(self.index))
    }

    pub fn standby(&self) -> Result<()> {
        self.send(CecCommand::Standby(self.index))
    }

    pub fn set_power(&self, on: bool) -> Result<()> {
        if on {
            self.power_on()
        } else {
            self.standby()
        }
    }

    /// Announce this device as the active source, or withdraw it.
    pub fn set_active_source(&self, active: bool) -> Result<()> {
        let bridge = self.sender.bridge_address();
        let command = if active {
            CecCommand::ActiveSource {
                bridge,
                address: self.address,
            }
        } else {
            CecCommand::InactiveSource {
                bridge,
                address: self.address,
            }
        };
        self.send(command)
    }

    /// Pass `text` to cec-client untouched.
    pub fn send_raw(&self, text: &str) -> Result<()> {
        self.send(CecCommand::Raw(text.to_string()))
    }

    /// Transmit a raw frame from the bridge to this device.
    ///
    /// `payload` is the opcode and operands, e.g. `"44:41"`.
    pub fn send_cec(&self, payload: &str) -> Result<()> {
        self.send(CecCommand::Transmit {
            bridge: self.sender.bridge_address(),
            device: self.index,
            payload: payload.to_string(),
        })
    }

    /// Press and release a remote-control key.
    pub fn press_remote_button(&self, button: RemoteButton) -> Result<()> {
        let bridge = self.sender.bridge_address();
        self.send(CecCommand::ButtonPress {
            bridge,
            device: self.index,
            button,
        })?;
        self.send(CecCommand::ButtonRelease {
            bridge,
            device: self.index,
        })
    }

    /// [`press_remote_button`](Self::press_remote_button) by key name, e.g.
    /// `"volume_up"`.
    pub fn press_remote_button_named(&self, name: &str) -> Result<()> {
        let button: RemoteButton = name.parse()?;
        self.press_remote_button(button)
    }

    pub fn snapshot(&self) -> EquipmentSnapshot {
        self.state.snapshot()
    }

    pub fn state(&self) -> &Arc<EquipmentState> {
        &self.state
    }

    fn send(&self, command: CecCommand) -> Result<()> {
        tracing::debug!(index = %self.index, command = %command, "Equipment command");
        Ok(self.sender.send_command(&command)?)
    }
}

impl std::fmt::Debug for Equipment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Equipment")
            .field("index", &self.index)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_for(index: char) -> EquipmentState {
        EquipmentState::new(
            LogicalAddress::from_char(index).unwrap(),
            "1.0.0.0".parse().unwrap(),
            true,
        )
    }

    #[test]
    fn test_events_for_this_device_update_state() {
        let state = state_for('4');
        let player = LogicalAddress::from_char('4');

        state.on_event(&Event::PowerOn { device: player });
        state.on_event(&Event::ActiveSourceOn { device: player });
        state.on_event(&Event::Raw {
            device: player,
            text: "volume up".to_string(),
        });

        let snapshot = state.snapshot();
        assert_eq!(snapshot.power, Some(true));
        assert_eq!(snapshot.active_source, Some(true));
        assert_eq!(snapshot.last_event.as_deref(), Some("volume up"));

        state.on_event(&Event::PowerOff { device: player });
        state.on_event(&Event::ActiveSourceOff { device: player });
        let snapshot = state.snapshot();
        assert_eq!(snapshot.power, Some(false));
        assert_eq!(snapshot.active_source, Some(false));
    }

    #[test]
    fn test_events_for_other_devices_are_ignored() {
        let state = state_for('4');
        state.on_event(&Event::PowerOn {
            device: LogicalAddress::from_char('0'),
        });
        state.on_event(&Event::PowerOn { device: None });
        assert_eq!(state.snapshot().power, None);
    }

    #[test]
    fn test_connection_status_follows_bridge() {
        let state = state_for('0');
        state.on_connection_status(false, "end of stream");
        let snapshot = state.snapshot();
        assert!(!snapshot.online);
        assert_eq!(snapshot.status.as_deref(), Some("end of stream"));

        state.on_connection_status(true, "connection opened");
        let snapshot = state.snapshot();
        assert!(snapshot.online);
        assert_eq!(snapshot.status, None);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let json = serde_json::to_value(state_for('4').snapshot()).unwrap();
        assert_eq!(json["index"], "4");
        assert_eq!(json["address"], "1.0.0.0");
        assert_eq!(json["activeSource"], serde_json::Value::Null);
    }
}
