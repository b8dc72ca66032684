//! In-memory transport for driving sessions from tests.
//!
//! [`MemoryTransport::pair`] returns the transport handed to the code under
//! test and a [`MemoryPeer`] that plays the remote side: it feeds lines in,
//! inspects what was written, and simulates hang-ups and process exits.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, TransportError};
use crate::{Connector, ReadOutcome, Transport};

enum Inbound {
    Line(String),
    Error(io::ErrorKind),
}

#[derive(Default)]
struct State {
    inbound: VecDeque<Inbound>,
    outbound: Vec<String>,
    closed: bool,
    hung_up: bool,
    exited: bool,
    fail_writes: bool,
}

struct Shared {
    state: Mutex<State>,
    readable: Condvar,
    written: Condvar,
    read_timeout: Duration,
}

/// The near side of an in-memory connection.
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

/// The far side of an in-memory connection.
#[derive(Clone)]
pub struct MemoryPeer {
    shared: Arc<Shared>,
}

impl MemoryTransport {
    /// Create a connected transport/peer pair with a 20 ms read timeout.
    pub fn pair() -> (Self, MemoryPeer) {
        Self::pair_with_timeout(Duration::from_millis(20))
    }

    pub fn pair_with_timeout(read_timeout: Duration) -> (Self, MemoryPeer) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            readable: Condvar::new(),
            written: Condvar::new(),
            read_timeout,
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MemoryPeer { shared },
        )
    }
}

impl Transport for MemoryTransport {
    fn read_line(&self) -> Result<ReadOutcome> {
        let mut state = self.shared.state.lock();
        if state.inbound.is_empty() && !state.closed && !state.hung_up {
            self.shared
                .readable
                .wait_for(&mut state, self.shared.read_timeout);
        }
        if state.closed {
            return Ok(ReadOutcome::EndOfStream);
        }
        match state.inbound.pop_front() {
            Some(Inbound::Line(line)) => Ok(ReadOutcome::Line(line)),
            Some(Inbound::Error(kind)) => Err(TransportError::Io(io::Error::from(kind))),
            None if state.hung_up => Ok(ReadOutcome::EndOfStream),
            None => Ok(ReadOutcome::Idle),
        }
    }

    fn write_line(&self, text: &str) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.fail_writes {
            return Err(TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        state.outbound.push(text.to_string());
        self.shared.written.notify_all();
        Ok(())
    }

    fn is_alive(&self) -> bool {
        let state = self.shared.state.lock();
        !state.closed && !state.exited
    }

    fn close(&self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        self.shared.readable.notify_all();
        self.shared.written.notify_all();
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

impl MemoryPeer {
    /// Queue a line for the transport to read.
    pub fn send_line(&self, line: impl Into<String>) {
        let mut state = self.shared.state.lock();
        state.inbound.push_back(Inbound::Line(line.into()));
        self.shared.readable.notify_all();
    }

    pub fn send_lines<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.shared.state.lock();
        state
            .inbound
            .extend(lines.into_iter().map(|line| Inbound::Line(line.into())));
        self.shared.readable.notify_all();
    }

    /// Make the next read fail with an I/O error of `kind`.
    pub fn fail_read(&self, kind: io::ErrorKind) {
        let mut state = self.shared.state.lock();
        state.inbound.push_back(Inbound::Error(kind));
        self.shared.readable.notify_all();
    }

    /// Close the far end: queued lines drain, then reads report end of stream.
    pub fn hang_up(&self) {
        let mut state = self.shared.state.lock();
        state.hung_up = true;
        self.shared.readable.notify_all();
    }

    /// Simulate the peer process exiting. Queued lines stay readable.
    pub fn exit(&self) {
        let mut state = self.shared.state.lock();
        state.exited = true;
        state.hung_up = true;
        self.shared.readable.notify_all();
    }

    pub fn fail_writes(&self, fail: bool) {
        self.shared.state.lock().fail_writes = fail;
    }

    /// Every line written so far, in order.
    pub fn written(&self) -> Vec<String> {
        self.shared.state.lock().outbound.clone()
    }

    /// Wait until at least `count` lines were written or `timeout` elapses.
    pub fn wait_for_written(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.outbound.len() < count {
            if self
                .shared
                .written
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }
        state.outbound.clone()
    }

    /// Whether the near side was closed.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

/// Connector handing out a fresh [`MemoryTransport`] per connect.
#[derive(Default)]
pub struct MemoryConnector {
    peers: Mutex<Vec<MemoryPeer>>,
    failures: Mutex<usize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` connect attempts fail.
    pub fn fail_next(&self, count: usize) {
        *self.failures.lock() = count;
    }

    pub fn connect_count(&self) -> usize {
        self.peers.lock().len()
    }

    /// The peer of the `n`th successful connection (zero based).
    pub fn peer(&self, n: usize) -> Option<MemoryPeer> {
        self.peers.lock().get(n).cloned()
    }

    pub fn latest_peer(&self) -> Option<MemoryPeer> {
        self.peers.lock().last().cloned()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self) -> Result<Arc<dyn Transport>> {
        {
            let mut failures = self.failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(TransportError::ConnectFailed {
                    address: "memory".to_string(),
                    source: io::Error::from(io::ErrorKind::ConnectionRefused),
                });
            }
        }
        let (transport, peer) = MemoryTransport::pair();
        self.peers.lock().push(peer);
        Ok(Arc::new(transport))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
