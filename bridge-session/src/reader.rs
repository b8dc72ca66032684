//! The per-connection reader thread
//!
//! Exactly one reader runs per live connection. It pulls lines, classifies
//! them, and fans the results out to consumers. It exits when the session
//! asks it to stop, when its generation is retired, or when the connection
//! fails; in the last case it reports the fault and the session tears down.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use cec_protocol::Classification;
use line_transport::{ReadOutcome, Transport};

use crate::session::Shared;

/// Why a reader loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReaderExit {
    /// Asked to stop, or superseded by a newer connection
    Stopped,
    /// The connection failed; carries the reason shown to consumers
    Fault(String),
}

pub(crate) fn spawn(
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    generation: u64,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("cec-bridge-reader".to_string())
        .spawn(move || {
            let reader = Reader {
                shared: &shared,
                transport: transport.as_ref(),
                generation,
            };
            let exit = reader.run();
            shared.handle_reader_exit(generation, exit);
        })
}

struct Reader<'a> {
    shared: &'a Shared,
    transport: &'a dyn Transport,
    generation: u64,
}

impl Reader<'_> {
    fn run(&self) -> ReaderExit {
        tracing::debug!(generation = self.generation, "Reader started");
        loop {
            if self.should_stop() {
                return ReaderExit::Stopped;
            }

            if !self.transport.is_alive() {
                self.drain();
                return self.fault("process ended");
            }

            let exit = match self.transport.read_line() {
                Ok(ReadOutcome::Line(line)) => self.dispatch(&line),
                Ok(ReadOutcome::Idle) => {
                    thread::sleep(self.shared.config.poll_interval);
                    None
                }
                Ok(ReadOutcome::EndOfStream) => Some(self.fault("end of stream")),
                Err(e) => Some(self.fault(&e.to_string())),
            };
            if let Some(exit) = exit {
                return exit;
            }
        }
    }

    fn should_stop(&self) -> bool {
        self.shared.is_superseded(self.generation)
    }

    /// A failure seen after a stop request is just the stop taking effect.
    fn fault(&self, reason: &str) -> ReaderExit {
        if self.should_stop() {
            ReaderExit::Stopped
        } else {
            ReaderExit::Fault(reason.to_string())
        }
    }

    /// Log whatever is still buffered from a peer that already exited.
    fn drain(&self) {
        while let Ok(ReadOutcome::Line(line)) = self.transport.read_line() {
            tracing::debug!(line = %line, "Output after peer exit");
        }
    }

    fn dispatch(&self, line: &str) -> Option<ReaderExit> {
        let known = self.shared.self_address().is_some();
        match self.shared.classifier.classify(line, known) {
            Classification::ConnectionStatus { online: true, reason } => {
                tracing::info!("CEC connection up");
                self.shared.consumers.broadcast_status(true, &reason);
            }
            Classification::ConnectionStatus { online: false, reason } => {
                tracing::warn!(line, "Peer reported CEC connection lost");
                return Some(self.fault(&reason));
            }
            Classification::Respond(command) => {
                if let Err(e) = self.shared.write(&command) {
                    tracing::debug!(command = %command, "Response not sent: {}", e);
                }
            }
            Classification::SelfAddress(address) => {
                if self.shared.learn_self_address(address) {
                    tracing::info!(%address, "Learned bridge logical address");
                }
            }
            Classification::BeginCapture => return self.capture(),
            Classification::Event(event) => {
                tracing::debug!(kind = event.kind(), device = ?event.device(), "Event");
                self.shared.consumers.broadcast_event(&event);
            }
            Classification::Echo => tracing::trace!(line, "Echo dropped"),
            Classification::Ignored => tracing::trace!(line, "Unmatched line"),
        }
        None
    }

    /// Collect a discovery dump until its terminator or the timeout.
    ///
    /// The result is delivered even when empty or cut short; a connection
    /// failure during the dump still faults the session afterwards.
    fn capture(&self) -> Option<ReaderExit> {
        let timeout = self.shared.config.discovery_timeout;
        let started = Instant::now();
        let mut lines = Vec::new();
        let mut terminated = false;
        let mut failure = None;

        tracing::debug!("Discovery capture started");
        while !self.should_stop() {
            if started.elapsed() >= timeout {
                break;
            }
            match self.transport.read_line() {
                Ok(ReadOutcome::Line(line)) => {
                    let ends = self.shared.classifier.ends_capture(&line);
                    lines.push(line);
                    if ends {
                        terminated = true;
                        break;
                    }
                }
                Ok(ReadOutcome::Idle) => {
                    if !self.transport.is_alive() {
                        failure = Some("process ended".to_string());
                        break;
                    }
                    thread::sleep(self.shared.config.poll_interval);
                }
                Ok(ReadOutcome::EndOfStream) => {
                    failure = Some("end of stream".to_string());
                    break;
                }
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        let mut scan = self.shared.classifier.segment(&lines, terminated);
        scan.timed_out = !terminated && failure.is_none() && started.elapsed() >= timeout;
        tracing::info!(
            devices = scan.len(),
            lines = lines.len(),
            terminated,
            timed_out = scan.timed_out,
            "Discovery capture finished"
        );
        self.shared.deliver_discovery(scan);

        match failure {
            Some(reason) => Some(self.fault(&reason)),
            None if self.should_stop() => Some(ReaderExit::Stopped),
            None => None,
        }
    }
}
