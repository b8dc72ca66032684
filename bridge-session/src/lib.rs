//! # bridge-session
//!
//! Runs one line-protocol connection at a time: a reader thread that turns
//! inbound lines into events and discovery results, a command sender that
//! writes atomically alongside it, and an optional supervisor that reconnects
//! after a failure.
//!
//! The session is protocol-agnostic. It is driven by a
//! [`Connector`](line_transport::Connector) that opens transports and a
//! [`LineClassifier`](cec_protocol::LineClassifier) that knows what the lines
//! mean.
//!
//! ## Lifecycle
//!
//! ```text
//! Stopped ──start──▶ Starting ──▶ Running ──stop──▶ Stopping ──▶ Stopped
//!                                    │
//!                                    └──fault──▶ Faulted ──▶ Stopped ──(supervisor)──▶ Starting
//! ```
//!
//! At most one reader runs per session. A start that finds the previous
//! reader still winding down waits for it up to `restart_grace`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bridge_session::{Session, SessionConfig};
//! use cec_protocol::{CecClassifier, CecCommand, LogicalAddress};
//! use line_transport::{ProcessConfig, TransportConfig};
//!
//! let session = Session::new(
//!     Arc::new(TransportConfig::Process(ProcessConfig::new("/usr/bin/cec-client"))),
//!     Arc::new(CecClassifier::with_defaults()?),
//!     SessionConfig::default(),
//! )?;
//! let events = session.subscribe();
//! session.start()?;
//!
//! let sender = session.sender();
//! sender.send_command(&CecCommand::PowerOn(LogicalAddress::new(0).unwrap()))?;
//!
//! for event in events.timeout_iter(Duration::from_secs(10)) {
//!     println!("{:?}", event);
//! }
//! ```

mod channel;
mod config;
mod consumer;
mod error;
mod reader;
mod sender;
mod session;
mod state;
mod supervisor;

pub use channel::{EventChannel, EventIterator, TimeoutIter, TryIter};
pub use config::{SessionConfig, MAX_TIMING};
pub use consumer::{BridgeConsumer, ConsumerId, DiscoveryConsumer};
pub use error::{Result, SessionError};
pub use sender::CommandSender;
pub use session::Session;
pub use state::{BridgeStatus, LoopState, OfflineDetail};
pub use supervisor::ReconnectPolicy;
