//! Sync-first event iterator
//!
//! [`Session::subscribe`](crate::Session::subscribe) registers an
//! [`EventChannel`] and hands back an [`EventIterator`] that owns it. Events
//! flow as long as the iterator lives; dropping it unsubscribes. Stopping the
//! session closes the channel, which ends blocking iteration once the queued
//! events are drained.
//!
//! # Example
//!
//! ```rust,ignore
//! let events = session.subscribe();
//!
//! // Blocking iteration
//! for event in events.timeout_iter(Duration::from_secs(1)) {
//!     println!("{:?}", event);
//! }
//!
//! // Non-blocking check
//! for event in events.try_iter() {
//!     println!("{:?}", event);
//! }
//! ```

use std::sync::{mpsc, Arc};
use std::time::Duration;

use cec_protocol::Event;
use parking_lot::Mutex;

use crate::consumer::BridgeConsumer;

/// Consumer that forwards everything into a channel.
///
/// Connection status changes arrive as [`Event::ConnectionStatus`].
pub struct EventChannel {
    tx: Mutex<Option<mpsc::Sender<Event>>>,
}

impl EventChannel {
    /// Create a channel consumer and the iterator draining it.
    pub fn new() -> (Arc<Self>, EventIterator) {
        let (tx, rx) = mpsc::channel();
        let channel = Arc::new(Self {
            tx: Mutex::new(Some(tx)),
        });
        let iter = EventIterator {
            rx,
            _channel: Arc::clone(&channel),
        };
        (channel, iter)
    }

    /// Drop the sending side. Later events are discarded and the iterator
    /// ends after draining what is already queued.
    pub fn close(&self) {
        self.tx.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }

    fn forward(&self, event: Event) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(event);
        }
    }
}

impl BridgeConsumer for EventChannel {
    fn on_event(&self, event: &Event) {
        self.forward(event.clone());
    }

    fn on_connection_status(&self, online: bool, reason: &str) {
        self.forward(Event::ConnectionStatus {
            online,
            reason: reason.to_string(),
        });
    }
}

/// Blocking iterator over bridge events
///
/// All methods are synchronous. The iterator keeps its [`EventChannel`]
/// alive; the session only holds it weakly. Blocking iteration ends when the
/// channel is closed, which happens when the session is stopped.
pub struct EventIterator {
    rx: mpsc::Receiver<Event>,
    _channel: Arc<EventChannel>,
}

impl EventIterator {
    /// Block until the next event is available
    ///
    /// Returns `None` once the channel is closed and drained.
    pub fn recv(&self) -> Option<Event> {
        self.rx.recv().ok()
    }

    /// Block until the next event or timeout expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Non-blocking iterator over currently queued events
    pub fn try_iter(&self) -> TryIter<'_> {
        TryIter { inner: self }
    }

    /// Iterator that blocks up to `timeout` per item and stops on the first
    /// timeout
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }
}

impl Iterator for EventIterator {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Non-blocking iterator over currently available events
pub struct TryIter<'a> {
    inner: &'a EventIterator,
}

impl Iterator for TryIter<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator with timeout
pub struct TimeoutIter<'a> {
    inner: &'a EventIterator,
    timeout: Duration,
}

impl Iterator for TimeoutIter<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cec_protocol::LogicalAddress;
    use std::thread;
    use std::time::Instant;

    fn standby() -> Event {
        Event::PowerOff {
            device: LogicalAddress::from_char('4'),
        }
    }

    #[test]
    fn test_try_recv_empty() {
        let (_channel, iter) = EventChannel::new();
        assert!(iter.try_recv().is_none());
    }

    #[test]
    fn test_events_and_status_are_forwarded() {
        let (channel, iter) = EventChannel::new();
        channel.on_event(&standby());
        channel.on_connection_status(false, "end of stream");

        let events: Vec<_> = iter.try_iter().collect();
        assert_eq!(
            events,
            vec![
                standby(),
                Event::ConnectionStatus {
                    online: false,
                    reason: "end of stream".to_string()
                }
            ]
        );
    }

    #[test]
    fn test_recv_timeout() {
        let (_channel, iter) = EventChannel::new();
        let start = Instant::now();
        assert!(iter.recv_timeout(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn test_blocking_recv_across_threads() {
        let (channel, iter) = EventChannel::new();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            channel.on_event(&standby());
        });
        assert_eq!(iter.recv_timeout(Duration::from_secs(2)), Some(standby()));
    }

    #[test]
    fn test_close_ends_iteration_after_draining() {
        let (channel, iter) = EventChannel::new();
        channel.on_event(&standby());
        channel.close();
        channel.on_event(&standby());

        assert!(channel.is_closed());
        let events: Vec<_> = iter.collect();
        assert_eq!(events, vec![standby()]);
    }

    #[test]
    fn test_timeout_iter_stops() {
        let (channel, iter) = EventChannel::new();
        channel.on_event(&standby());
        channel.on_event(&standby());
        let events: Vec<_> = iter.timeout_iter(Duration::from_millis(20)).collect();
        assert_eq!(events.len(), 2);
    }
}
