//! # HDMI-CEC Bridge
//!
//! Drives `cec-client` (or a TCP peer speaking the same line protocol),
//! turns its status output into typed events, and sends commands to the
//! devices on the bus.
//!
//! ```rust,no_run
//! use cec_bridge::{BridgeConfig, CecBridge, Event};
//!
//! fn main() -> Result<(), cec_bridge::BridgeError> {
//!     let bridge = CecBridge::new(BridgeConfig::new())?;
//!     let events = bridge.subscribe();
//!     bridge.start()?;
//!
//!     let tv = bridge.add_equipment("0".parse()?, "0.0.0.0".parse()?);
//!     tv.power_on()?;
//!
//!     for event in events {
//!         if let Event::PowerOn { device } = event {
//!             println!("{device:?} turned on");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! cec-bridge (config, equipment registry, logging)
//!     ↓
//! bridge-session (reader thread, discovery capture, sender, reconnect)
//!     ↓                               ↓
//! cec-protocol (patterns, commands)   line-transport (process stdio, TCP)
//! ```
//!
//! ## Key Features
//!
//! - **Sync-first**: no async runtime; one background reader per bridge
//! - **Configurable patterns**: every inbound regex can be overridden
//! - **Discovery**: `discover()` scans the bus and returns device records
//! - **Equipment handles**: power, active source, raw frames, remote keys

mod bridge;
pub mod config;
mod equipment;
mod error;
pub mod logging;

pub use bridge::CecBridge;
pub use config::BridgeConfig;
pub use equipment::{Equipment, EquipmentSnapshot, EquipmentState};
pub use error::{BridgeError, Result};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};

pub use bridge_session::{
    BridgeConsumer, BridgeStatus, CommandSender, ConsumerId, DiscoveryConsumer, EventIterator,
    LoopState, OfflineDetail, ReconnectPolicy, SessionConfig,
};
pub use cec_protocol::{
    CecCommand, DeviceInfo, DiscoveryScan, Event, LogicalAddress, PatternConfig, PhysicalAddress,
    RemoteButton,
};

#[cfg(feature = "test-support")]
pub use line_transport::memory;
