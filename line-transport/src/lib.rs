//! Line-oriented duplex transports
//!
//! This crate owns the byte stream between the bridge and whatever speaks the
//! line protocol on the other end: a `cec-client` subprocess talking over its
//! stdio, or a TCP peer. Both are exposed through the same [`Transport`] trait
//! so the session layer never needs to know which one it is driving.
//!
//! # Quick Start
//!
//! ```no_run
//! use line_transport::{open, ProcessConfig, ReadOutcome, TransportConfig};
//!
//! let config = TransportConfig::Process(
//!     ProcessConfig::new("/usr/bin/cec-client").with_args(["--log-level", "1"]),
//! );
//! let transport = open(&config)?;
//! transport.write_line("scan")?;
//!
//! while transport.is_alive() {
//!     match transport.read_line()? {
//!         ReadOutcome::Line(line) => println!("{line}"),
//!         ReadOutcome::Idle => continue,
//!         ReadOutcome::EndOfStream => break,
//!     }
//! }
//! transport.close();
//! # Ok::<(), line_transport::TransportError>(())
//! ```

mod error;
mod line;
mod process;
mod tcp;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

use std::sync::Arc;

pub use error::{Result, TransportError};
pub use process::{ProcessConfig, ProcessTransport};
pub use tcp::{TcpConfig, TcpTransport};

/// Terminator appended to every outbound line.
pub const LINE_TERMINATOR: &str = "\n";

/// Result of a single [`Transport::read_line`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete line, without its terminator
    Line(String),
    /// No data arrived within the read timeout; not an error
    Idle,
    /// The peer closed the stream
    EndOfStream,
}

/// A duplex, line-buffered stream to a line-protocol peer.
///
/// All methods take `&self`: one handle is shared between the reader thread,
/// concurrent command writers and whoever tears the connection down.
/// `close` must never wait on an in-flight `read_line`; it is the mechanism
/// that forces a blocked reader to return.
pub trait Transport: Send + Sync {
    /// Read the next line, blocking up to the transport's read timeout.
    fn read_line(&self) -> Result<ReadOutcome>;

    /// Write `text` followed by [`LINE_TERMINATOR`] and flush.
    ///
    /// A single call is atomic with respect to other writers.
    fn write_line(&self, text: &str) -> Result<()>;

    /// Whether the peer (process or socket) is still usable.
    fn is_alive(&self) -> bool;

    /// Release every underlying handle. Idempotent.
    fn close(&self);

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Something that can produce a fresh [`Transport`].
///
/// The session asks its connector for a new transport on every (re)start, so
/// a reconnect gets a new handle while everything above it stays put.
pub trait Connector: Send + Sync {
    /// Open a new connection.
    fn connect(&self) -> Result<Arc<dyn Transport>>;

    /// Short human-readable description of the target.
    fn describe(&self) -> String;
}

/// Which transport to open and how.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportConfig {
    /// Launch a subprocess and talk over its stdio
    Process(ProcessConfig),
    /// Connect to a TCP peer
    Tcp(TcpConfig),
}

impl Connector for TransportConfig {
    fn connect(&self) -> Result<Arc<dyn Transport>> {
        open(self)
    }

    fn describe(&self) -> String {
        match self {
            TransportConfig::Process(config) => config.describe(),
            TransportConfig::Tcp(config) => config.address(),
        }
    }
}

/// Open the transport described by `config`.
///
/// # Errors
///
/// Returns [`TransportError::NotFound`] or [`TransportError::SpawnFailed`] for
/// subprocess targets and [`TransportError::ConnectFailed`] for TCP targets.
pub fn open(config: &TransportConfig) -> Result<Arc<dyn Transport>> {
    match config {
        TransportConfig::Process(config) => Ok(Arc::new(ProcessTransport::spawn(config)?)),
        TransportConfig::Tcp(config) => Ok(Arc::new(TcpTransport::connect(config)?)),
    }
}
