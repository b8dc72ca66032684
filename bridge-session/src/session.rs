//! Bridge session lifecycle
//!
//! A [`Session`] owns one connection at a time and exactly one reader thread
//! for it. Start, stop, fault teardown and every write go through a single
//! lifecycle lock, so a write can never race the handle being torn down and
//! a restart can never overlap a reader that is still running.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use cec_protocol::{DiscoveryScan, LineClassifier, LogicalAddress};
use line_transport::{Connector, Transport};
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::channel::{EventChannel, EventIterator};
use crate::config::SessionConfig;
use crate::consumer::{self, BridgeConsumer, ConsumerId, ConsumerRegistry, DiscoveryConsumer};
use crate::error::{Result, SessionError};
use crate::reader::{self, ReaderExit};
use crate::sender::CommandSender;
use crate::state::{BridgeStatus, LoopState, OfflineDetail};
use crate::supervisor;

const STOPPED_REASON: &str = "bridge stopped";

struct Lifecycle {
    state: LoopState,
    transport: Option<Arc<dyn Transport>>,
    reader: Option<JoinHandle<()>>,
}

struct PendingDiscovery {
    consumer: Arc<dyn DiscoveryConsumer>,
    requested_at: Instant,
}

/// How a start attempt ended.
pub(crate) enum StartOutcome {
    Started,
    /// A reconnect found the session stopped or restarted in the meantime
    Superseded,
}

enum StartOrigin {
    Explicit,
    Reconnect { generation: u64 },
}

/// State shared by the session handle, its reader, senders and supervisor.
pub(crate) struct Shared {
    pub(crate) config: SessionConfig,
    connector: Arc<dyn Connector>,
    pub(crate) classifier: Arc<dyn LineClassifier>,
    lifecycle: Mutex<Lifecycle>,
    /// Bumped on every successful connect; readers and supervisors of an
    /// older generation stand down
    generation: AtomicU64,
    stop_requested: AtomicBool,
    self_address: RwLock<Option<LogicalAddress>>,
    pub(crate) consumers: ConsumerRegistry,
    subscriptions: Mutex<Vec<Weak<EventChannel>>>,
    pending_discovery: Mutex<Option<PendingDiscovery>>,
    status: RwLock<BridgeStatus>,
}

impl Shared {
    fn start(self: &Arc<Self>, origin: StartOrigin) -> Result<StartOutcome> {
        let mut lifecycle = self.lock_for_start()?;

        match origin {
            StartOrigin::Explicit => self.stop_requested.store(false, Ordering::SeqCst),
            StartOrigin::Reconnect { generation } => {
                if self.is_superseded(generation) {
                    return Ok(StartOutcome::Superseded);
                }
            }
        }

        lifecycle.state = LoopState::Starting;
        tracing::debug!(target_peer = %self.connector.describe(), "Starting bridge session");

        let transport = match self.connector.connect() {
            Ok(transport) => transport,
            Err(e) => {
                lifecycle.state = LoopState::Stopped;
                let detail = if e.is_open_failure() {
                    OfflineDetail::ConfigurationError
                } else {
                    OfflineDetail::CommunicationError
                };
                tracing::warn!("Failed to open {}: {}", self.connector.describe(), e);
                self.set_status(BridgeStatus::offline(detail, e.to_string()));
                return Err(e.into());
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.self_address.write() = None;

        match reader::spawn(Arc::clone(self), Arc::clone(&transport), generation) {
            Ok(handle) => {
                let peer = transport.describe();
                lifecycle.transport = Some(transport);
                lifecycle.reader = Some(handle);
                lifecycle.state = LoopState::Running;
                self.set_status(BridgeStatus::Online);
                tracing::info!(generation, %peer, "Bridge session running");
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                transport.close();
                lifecycle.state = LoopState::Stopped;
                self.set_status(BridgeStatus::offline(
                    OfflineDetail::CommunicationError,
                    e.to_string(),
                ));
                Err(SessionError::Io(e))
            }
        }
    }

    /// Lock the lifecycle once no previous reader is left running.
    ///
    /// Polls for up to `restart_grace`. The calling thread itself never
    /// counts: a consumer callback restarting the session runs on the reader
    /// that is about to exit.
    fn lock_for_start(&self) -> Result<MutexGuard<'_, Lifecycle>> {
        let deadline = Instant::now() + self.config.restart_grace;
        loop {
            {
                let mut lifecycle = self.lifecycle.lock();
                if lifecycle.state.is_active() {
                    return Err(SessionError::AlreadyRunning(lifecycle.state));
                }
                let previous_done = match &lifecycle.reader {
                    None => true,
                    Some(handle) => {
                        handle.is_finished() || handle.thread().id() == thread::current().id()
                    }
                };
                if previous_done {
                    if let Some(handle) = lifecycle.reader.take() {
                        if handle.is_finished() && handle.join().is_err() {
                            tracing::warn!("Previous reader thread panicked");
                        }
                    }
                    return Ok(lifecycle);
                }
            }

            if Instant::now() >= deadline {
                return Err(SessionError::PreviousSessionStillActive(
                    self.config.restart_grace,
                ));
            }
            tracing::debug!("Waiting for the previous reader to finish");
            thread::sleep(self.config.poll_interval);
        }
    }

    fn stop(&self) -> Result<()> {
        self.stop_requested.store(true, Ordering::SeqCst);

        let (transport, reader) = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != LoopState::Running {
                tracing::debug!(state = %lifecycle.state, "Stop on a session that is not running");
                drop(lifecycle);
                self.close_subscriptions();
                return Ok(());
            }
            lifecycle.state = LoopState::Stopping;
            (lifecycle.transport.take(), lifecycle.reader.take())
        };

        if let Some(transport) = &transport {
            self.shut_down(transport.as_ref());
        }

        let unfinished = reader.and_then(|handle| self.join_reader(handle));

        {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.state = LoopState::Stopped;
            lifecycle.reader = unfinished;
        }
        *self.self_address.write() = None;
        self.pending_discovery.lock().take();
        self.set_status(BridgeStatus::offline(OfflineDetail::None, STOPPED_REASON));
        self.consumers.broadcast_status(false, STOPPED_REASON);
        self.close_subscriptions();
        tracing::info!("Bridge session stopped");
        Ok(())
    }

    /// End every iterator handed out by `subscribe`.
    fn close_subscriptions(&self) {
        let channels = std::mem::take(&mut *self.subscriptions.lock());
        for channel in channels.iter().filter_map(Weak::upgrade) {
            channel.close();
        }
    }

    /// Quit politely, give the peer `shutdown_grace` to leave, then close.
    fn shut_down(&self, transport: &dyn Transport) {
        if let Some(quit) = self.classifier.quit_command() {
            if let Err(e) = transport.write_line(&quit) {
                tracing::debug!("Quit command not delivered: {}", e);
            }
        }
        let deadline = Instant::now() + self.config.shutdown_grace;
        while transport.is_alive() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(self.config.poll_interval.min(deadline - now));
        }
        transport.close();
    }

    /// Join the reader within `stop_timeout`; hand it back if it is still
    /// running so the next start keeps waiting for it.
    fn join_reader(&self, handle: JoinHandle<()>) -> Option<JoinHandle<()>> {
        if handle.thread().id() == thread::current().id() {
            // Stopped from a consumer callback; the loop sees the flag next.
            return None;
        }
        let deadline = Instant::now() + self.config.stop_timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    "Reader did not finish within {:?}",
                    self.config.stop_timeout
                );
                return Some(handle);
            }
            thread::sleep(self.config.poll_interval);
        }
        if handle.join().is_err() {
            tracing::warn!("Reader thread panicked");
        }
        None
    }

    /// Called by the reader thread as its last act.
    pub(crate) fn handle_reader_exit(self: &Arc<Self>, generation: u64, exit: ReaderExit) {
        let reason = match exit {
            ReaderExit::Stopped => {
                tracing::debug!(generation, "Reader stopped");
                return;
            }
            ReaderExit::Fault(reason) => reason,
        };

        let transport = {
            let mut lifecycle = self.lifecycle.lock();
            if self.is_superseded(generation) || lifecycle.state != LoopState::Running {
                tracing::debug!(generation, %reason, "Ignoring fault of a retired reader");
                return;
            }
            lifecycle.state = LoopState::Faulted;
            lifecycle.transport.take()
        };

        tracing::warn!(generation, %reason, "Bridge session faulted");
        if let Some(transport) = transport {
            transport.close();
        }
        *self.self_address.write() = None;
        self.pending_discovery.lock().take();
        self.set_status(BridgeStatus::offline(
            OfflineDetail::CommunicationError,
            reason.clone(),
        ));
        self.consumers.broadcast_status(false, &reason);

        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == LoopState::Faulted
                && self.generation.load(Ordering::SeqCst) == generation
            {
                lifecycle.state = LoopState::Stopped;
            }
        }

        if self.config.reconnect.is_enabled() && !self.is_superseded(generation) {
            supervisor::spawn(Arc::clone(self), generation);
        }
    }

    pub(crate) fn reconnect(self: &Arc<Self>, generation: u64) -> Result<StartOutcome> {
        self.start(StartOrigin::Reconnect { generation })
    }

    /// Whether the connection of `generation` has been replaced or stopped.
    pub(crate) fn is_superseded(&self, generation: u64) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
            || self.generation.load(Ordering::SeqCst) != generation
    }

    /// Write one command line to the live connection.
    pub(crate) fn write(&self, text: &str) -> Result<()> {
        let lifecycle = self.lifecycle.lock();
        let transport = match (&lifecycle.state, &lifecycle.transport) {
            (LoopState::Running, Some(transport)) => transport,
            _ => {
                tracing::debug!(command = text, "Not connected; command dropped");
                return Err(SessionError::NotConnected);
            }
        };
        tracing::debug!(command = text, "Sending command");
        transport.write_line(text).map_err(|e| {
            tracing::warn!(command = text, "Failed to send command: {}", e);
            SessionError::from_write(e)
        })
    }

    pub(crate) fn state(&self) -> LoopState {
        self.lifecycle.lock().state
    }

    pub(crate) fn self_address(&self) -> Option<LogicalAddress> {
        *self.self_address.read()
    }

    /// Store the local address unless one is already known.
    pub(crate) fn learn_self_address(&self, address: LogicalAddress) -> bool {
        let mut slot = self.self_address.write();
        if slot.is_some() {
            return false;
        }
        *slot = Some(address);
        true
    }

    fn set_status(&self, status: BridgeStatus) {
        tracing::debug!(?status, "Bridge status changed");
        *self.status.write() = status;
    }

    fn start_discovery(&self, consumer: Arc<dyn DiscoveryConsumer>) -> Result<()> {
        {
            let mut pending = self.pending_discovery.lock();
            if let Some(previous) = pending.as_ref() {
                let stale_after = self.config.discovery_wait();
                if previous.requested_at.elapsed() < stale_after {
                    return Err(SessionError::DiscoveryInProgress);
                }
                tracing::debug!("Replacing a discovery request that never got an answer");
            }
            *pending = Some(PendingDiscovery {
                consumer,
                requested_at: Instant::now(),
            });
        }

        let scan = self.classifier.scan_command();
        if let Err(e) = self.write(&scan) {
            self.pending_discovery.lock().take();
            return Err(e);
        }
        Ok(())
    }

    /// Hand a finished capture to whoever asked for it.
    pub(crate) fn deliver_discovery(&self, scan: DiscoveryScan) {
        let pending = self.pending_discovery.lock().take();
        match pending {
            Some(pending) => {
                consumer::isolate("on_devices_found", || {
                    pending.consumer.on_devices_found(scan)
                });
            }
            None => tracing::debug!(
                devices = scan.len(),
                "Discovery output without a pending request dropped"
            ),
        }
    }
}

/// One bridge session: a connection, its reader thread and its consumers.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use bridge_session::{Session, SessionConfig};
/// use cec_protocol::CecClassifier;
/// use line_transport::{ProcessConfig, TransportConfig};
///
/// let connector = TransportConfig::Process(
///     ProcessConfig::new("/usr/bin/cec-client").with_args(["--log-level", "1"]),
/// );
/// let session = Session::new(
///     Arc::new(connector),
///     Arc::new(CecClassifier::with_defaults()?),
///     SessionConfig::default(),
/// )?;
///
/// let events = session.subscribe();
/// session.start()?;
/// for event in events.timeout_iter(Duration::from_secs(30)) {
///     println!("{:?}", event);
/// }
/// session.stop()?;
/// ```
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Create a stopped session.
    ///
    /// # Errors
    ///
    /// [`SessionError::Configuration`] if `config` does not validate.
    pub fn new(
        connector: Arc<dyn Connector>,
        classifier: Arc<dyn LineClassifier>,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                connector,
                classifier,
                lifecycle: Mutex::new(Lifecycle {
                    state: LoopState::Stopped,
                    transport: None,
                    reader: None,
                }),
                generation: AtomicU64::new(0),
                stop_requested: AtomicBool::new(false),
                self_address: RwLock::new(None),
                consumers: ConsumerRegistry::default(),
                subscriptions: Mutex::new(Vec::new()),
                pending_discovery: Mutex::new(None),
                status: RwLock::new(BridgeStatus::Uninitialized),
            }),
        })
    }

    /// Connect and spawn the reader.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyRunning`] unless the session is stopped
    /// - [`SessionError::PreviousSessionStillActive`] if the last reader
    ///   did not finish within `restart_grace`
    /// - [`SessionError::Transport`] if the connection cannot be opened; the
    ///   status becomes offline with a configuration error
    pub fn start(&self) -> Result<()> {
        match self.shared.start(StartOrigin::Explicit)? {
            StartOutcome::Started => Ok(()),
            StartOutcome::Superseded => Err(SessionError::NotConnected),
        }
    }

    /// Send the quit command, close the connection and wait for the reader.
    ///
    /// Stopping a session that is not running is a no-op. Also cancels any
    /// pending reconnect.
    pub fn stop(&self) -> Result<()> {
        self.shared.stop()
    }

    /// Write one command line.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] when not running, [`SessionError::Io`]
    /// when the write fails.
    pub fn send(&self, text: &str) -> Result<()> {
        self.shared.write(text)
    }

    /// Clonable handle for issuing commands.
    pub fn sender(&self) -> CommandSender {
        CommandSender::new(Arc::clone(&self.shared))
    }

    /// Register a consumer. The session holds it weakly.
    pub fn register<C>(&self, consumer: &Arc<C>) -> ConsumerId
    where
        C: BridgeConsumer + 'static,
    {
        let weak = Arc::downgrade(consumer);
        self.shared.consumers.register(weak)
    }

    pub fn unregister(&self, id: ConsumerId) -> bool {
        self.shared.consumers.unregister(id)
    }

    /// Number of registered consumers still alive.
    pub fn consumer_count(&self) -> usize {
        self.shared.consumers.len()
    }

    /// Blocking iterator over events; dropping it unsubscribes.
    ///
    /// The iterator ends once the session is stopped. Subscribe again after
    /// a restart.
    pub fn subscribe(&self) -> EventIterator {
        let (channel, iter) = EventChannel::new();
        self.register(&channel);
        let mut subscriptions = self.shared.subscriptions.lock();
        subscriptions.retain(|weak| weak.strong_count() > 0);
        subscriptions.push(Arc::downgrade(&channel));
        iter
    }

    /// Ask the peer for its device inventory; `consumer` gets the result.
    ///
    /// # Errors
    ///
    /// [`SessionError::DiscoveryInProgress`] while an earlier request is
    /// still waiting, or the send error.
    pub fn start_discovery<D>(&self, consumer: D) -> Result<()>
    where
        D: DiscoveryConsumer + 'static,
    {
        self.shared.start_discovery(Arc::new(consumer))
    }

    /// Run a discovery and wait for its result.
    ///
    /// Waits `discovery_timeout + discovery_grace`. A capture that hits its
    /// own timeout still returns, flagged `timed_out`.
    pub fn discover(&self) -> Result<DiscoveryScan> {
        let (tx, rx) = mpsc::channel();
        self.shared.start_discovery(Arc::new(move |scan: DiscoveryScan| {
            let _ = tx.send(scan);
        }))?;

        let wait = self.shared.config.discovery_wait();
        match rx.recv_timeout(wait) {
            Ok(scan) => Ok(scan),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                self.shared.pending_discovery.lock().take();
                Err(SessionError::DiscoveryTimeout(wait))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(SessionError::NotConnected),
        }
    }

    pub fn state(&self) -> LoopState {
        self.shared.state()
    }

    pub fn status(&self) -> BridgeStatus {
        self.shared.status.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Local logical address, once learned.
    pub fn self_address(&self) -> Option<LogicalAddress> {
        self.shared.self_address()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.shared.stop() {
            tracing::debug!("Stop on drop failed: {}", e);
        }
    }
}
