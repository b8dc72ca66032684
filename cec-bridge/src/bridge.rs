//! CecBridge - main entry point
//!
//! Owns one bridge session plus the registry of equipment behind it.

use std::collections::BTreeMap;
use std::sync::Arc;

use bridge_session::{
    BridgeConsumer, BridgeStatus, CommandSender, ConsumerId, DiscoveryConsumer, EventIterator,
    Session,
};
use cec_protocol::{CecClassifier, DeviceInfo, DiscoveryScan, LogicalAddress, PhysicalAddress};
use line_transport::Connector;
use parking_lot::RwLock;

use crate::config::BridgeConfig;
use crate::equipment::{Equipment, EquipmentState};
use crate::error::{BridgeError, Result};

/// An HDMI-CEC bridge
///
/// Fully synchronous. Events are parsed on a background reader thread and
/// delivered to registered consumers; commands can be sent from any thread.
///
/// # Example
///
/// ```rust,ignore
/// use cec_bridge::{BridgeConfig, CecBridge};
///
/// fn main() -> Result<(), cec_bridge::BridgeError> {
///     let bridge = CecBridge::new(BridgeConfig::new().with_com_port("RPI"))?;
///     bridge.start()?;
///
///     let scan = bridge.discover()?;
///     for device in &scan.devices {
///         let equipment = bridge.add_discovered(device)?;
///         println!("{} {}", device.osd_name, equipment.index());
///     }
///
///     // Runs until another thread stops the bridge
///     for event in bridge.subscribe() {
///         println!("{:?}", event);
///     }
///     Ok(())
/// }
/// ```
pub struct CecBridge {
    config: BridgeConfig,
    session: Session,
    equipment: RwLock<BTreeMap<LogicalAddress, Equipment>>,
}

impl CecBridge {
    /// Create a stopped bridge from `config`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Config`] or [`BridgeError::Protocol`] if the
    /// configuration does not validate.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let connector = Arc::new(config.to_transport_config());
        Self::with_connector(config, connector)
    }

    /// Create a stopped bridge that opens its connections through
    /// `connector` instead of the one described by `config`.
    pub fn with_connector(config: BridgeConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let classifier = Arc::new(CecClassifier::new(config.pattern_set()?));
        let session = Session::new(connector, classifier, config.to_session_config())?;
        tracing::debug!(socket = config.is_socket(), "Created CEC bridge");
        Ok(Self {
            config,
            session,
            equipment: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn start(&self) -> Result<()> {
        Ok(self.session.start()?)
    }

    pub fn stop(&self) -> Result<()> {
        Ok(self.session.stop()?)
    }

    pub fn status(&self) -> BridgeStatus {
        self.session.status()
    }

    pub fn is_online(&self) -> bool {
        self.session.status().is_online()
    }

    /// The bridge's own logical address, once cec-client reported it.
    pub fn self_address(&self) -> Option<LogicalAddress> {
        self.session.self_address()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn sender(&self) -> CommandSender {
        self.session.sender()
    }

    /// Send a raw command line.
    pub fn send(&self, text: &str) -> Result<()> {
        Ok(self.session.send(text)?)
    }

    /// Blocking iterator over every event the bridge parses.
    ///
    /// The iterator ends when the bridge is stopped.
    pub fn subscribe(&self) -> EventIterator {
        self.session.subscribe()
    }

    /// Register a consumer; the bridge holds it weakly.
    pub fn register<C>(&self, consumer: &Arc<C>) -> ConsumerId
    where
        C: BridgeConsumer + 'static,
    {
        self.session.register(consumer)
    }

    pub fn unregister(&self, id: ConsumerId) -> bool {
        self.session.unregister(id)
    }

    /// Scan the bus and wait for the device inventory.
    pub fn discover(&self) -> Result<DiscoveryScan> {
        Ok(self.session.discover()?)
    }

    /// Scan the bus; `consumer` receives the inventory on the reader thread.
    pub fn start_discovery<D>(&self, consumer: D) -> Result<()>
    where
        D: DiscoveryConsumer + 'static,
    {
        Ok(self.session.start_discovery(consumer)?)
    }

    /// Add (or replace) the equipment at `index`.
    ///
    /// The equipment starts with the bridge's current online flag.
    pub fn add_equipment(&self, index: LogicalAddress, address: PhysicalAddress) -> Equipment {
        let state = Arc::new(EquipmentState::new(index, address, self.is_online()));
        let consumer_id = self.session.register(&state);
        let equipment = Equipment::new(index, address, self.sender(), state, consumer_id);

        let replaced = self.equipment.write().insert(index, equipment.clone());
        if let Some(previous) = replaced {
            self.session.unregister(previous.consumer_id());
        }
        tracing::info!(%index, %address, "Equipment added");
        equipment
    }

    /// Add equipment for a discovered device.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Protocol`] if the device reported a malformed physical
    /// address.
    pub fn add_discovered(&self, device: &DeviceInfo) -> Result<Equipment> {
        let address = device.physical_address().ok_or_else(|| {
            BridgeError::Protocol(cec_protocol::ProtocolError::InvalidPhysicalAddress(
                device.address.clone(),
            ))
        })?;
        Ok(self.add_equipment(device.index, address))
    }

    pub fn equipment(&self, index: LogicalAddress) -> Option<Equipment> {
        self.equipment.read().get(&index).cloned()
    }

    /// All equipment, ordered by logical index.
    pub fn equipment_list(&self) -> Vec<Equipment> {
        self.equipment.read().values().cloned().collect()
    }

    /// Remove the equipment at `index`; its state stops receiving events.
    pub fn remove_equipment(&self, index: LogicalAddress) -> Option<Equipment> {
        let removed = self.equipment.write().remove(&index)?;
        self.session.unregister(removed.consumer_id());
        tracing::info!(%index, "Equipment removed");
        Some(removed)
    }
}
