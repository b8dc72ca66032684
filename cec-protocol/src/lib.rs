//! The cec-client line protocol
//!
//! Everything here is pure: turning status lines into [`Event`]s, carving a
//! discovery dump into [`DeviceInfo`] records, and rendering [`CecCommand`]s
//! back into command strings. No I/O happens in this crate; the session layer
//! drives it through the [`LineClassifier`] trait.
//!
//! ```
//! use cec_protocol::{CecClassifier, Classification, Event, LineClassifier};
//!
//! let classifier = CecClassifier::with_defaults()?;
//! let line = "TV (0): power status changed from 'standby' to 'on'";
//!
//! match classifier.classify(line, true) {
//!     Classification::Event(Event::PowerOn { device }) => {
//!         assert_eq!(device.map(|d| d.as_char()), Some('0'));
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! # Ok::<(), cec_protocol::ProtocolError>(())
//! ```

pub mod address;
pub mod classify;
pub mod command;
pub mod discovery;
pub mod error;
pub mod event;
pub mod patterns;
pub mod remote;

pub use address::{LogicalAddress, PhysicalAddress};
pub use classify::{CecClassifier, Classification, LineClassifier};
pub use command::CecCommand;
pub use discovery::{unique_id, DeviceInfo, DiscoveryScan};
pub use error::{ProtocolError, Result};
pub use event::Event;
pub use patterns::{LineMatch, PatternConfig, PatternRule, PatternSet, RuleKind};
pub use remote::RemoteButton;
