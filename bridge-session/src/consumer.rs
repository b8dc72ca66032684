//! Consumer interfaces and the weakly-held consumer registry

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use cec_protocol::{DiscoveryScan, Event};
use parking_lot::RwLock;

/// Receives everything the bridge parses.
///
/// Callbacks run on the session's reader thread, in line order. A panic in
/// one consumer is caught and logged; the others still get the event.
pub trait BridgeConsumer: Send + Sync {
    fn on_event(&self, event: &Event);

    /// The connection came up (`"connection opened"`) or went away.
    fn on_connection_status(&self, online: bool, reason: &str) {
        let _ = (online, reason);
    }
}

/// Receives the result of one discovery request.
pub trait DiscoveryConsumer: Send + Sync {
    fn on_devices_found(&self, scan: DiscoveryScan);
}

impl<F> DiscoveryConsumer for F
where
    F: Fn(DiscoveryScan) + Send + Sync,
{
    fn on_devices_found(&self, scan: DiscoveryScan) {
        self(scan)
    }
}

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

/// Registered consumers, held weakly.
///
/// The session never keeps a consumer alive; dropping the last strong
/// reference is as good as unregistering.
#[derive(Default)]
pub(crate) struct ConsumerRegistry {
    next_id: AtomicU64,
    entries: RwLock<Vec<(ConsumerId, Weak<dyn BridgeConsumer>)>>,
}

impl ConsumerRegistry {
    pub fn register(&self, consumer: Weak<dyn BridgeConsumer>) -> ConsumerId {
        let id = ConsumerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, consumer));
        id
    }

    pub fn unregister(&self, id: ConsumerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    /// Number of consumers still alive.
    pub fn len(&self) -> usize {
        self.live().len()
    }

    /// Upgrade every entry, pruning the dead ones.
    fn live(&self) -> Vec<Arc<dyn BridgeConsumer>> {
        let (live, dead) = {
            let entries = self.entries.read();
            let live: Vec<_> = entries.iter().filter_map(|(_, weak)| weak.upgrade()).collect();
            let dead = entries.len() - live.len();
            (live, dead)
        };
        if dead > 0 {
            self.entries.write().retain(|(_, weak)| weak.strong_count() > 0);
            tracing::trace!(pruned = dead, "dropped consumers removed");
        }
        live
    }

    pub fn broadcast_event(&self, event: &Event) {
        for consumer in self.live() {
            isolate("on_event", || consumer.on_event(event));
        }
    }

    pub fn broadcast_status(&self, online: bool, reason: &str) {
        for consumer in self.live() {
            isolate("on_connection_status", || {
                consumer.on_connection_status(online, reason)
            });
        }
    }
}

/// Run one consumer callback, logging instead of propagating a panic.
pub(crate) fn isolate(callback: &str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::warn!(callback, "consumer panicked; continuing with the remaining consumers");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cec_protocol::LogicalAddress;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
        statuses: Mutex<Vec<(bool, String)>>,
    }

    impl BridgeConsumer for Recorder {
        fn on_event(&self, event: &Event) {
            self.events.lock().push(event.clone());
        }

        fn on_connection_status(&self, online: bool, reason: &str) {
            self.statuses.lock().push((online, reason.to_string()));
        }
    }

    struct Panicker;

    impl BridgeConsumer for Panicker {
        fn on_event(&self, _event: &Event) {
            panic!("consumer bug");
        }
    }

    fn power_on() -> Event {
        Event::PowerOn {
            device: LogicalAddress::from_char('0'),
        }
    }

    #[test]
    fn test_broadcast_reaches_every_consumer() {
        let registry = ConsumerRegistry::default();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        registry.register(Arc::downgrade(&first) as Weak<dyn BridgeConsumer>);
        registry.register(Arc::downgrade(&second) as Weak<dyn BridgeConsumer>);

        registry.broadcast_event(&power_on());
        registry.broadcast_status(true, "connection opened");

        for recorder in [&first, &second] {
            assert_eq!(recorder.events.lock().as_slice(), &[power_on()]);
            assert_eq!(
                recorder.statuses.lock().as_slice(),
                &[(true, "connection opened".to_string())]
            );
        }
    }

    #[test]
    fn test_panicking_consumer_is_isolated() {
        let registry = ConsumerRegistry::default();
        let panicker = Arc::new(Panicker);
        let recorder = Arc::new(Recorder::default());
        registry.register(Arc::downgrade(&panicker) as Weak<dyn BridgeConsumer>);
        registry.register(Arc::downgrade(&recorder) as Weak<dyn BridgeConsumer>);

        registry.broadcast_event(&power_on());

        assert_eq!(recorder.events.lock().len(), 1);
    }

    #[test]
    fn test_dropped_consumers_are_pruned() {
        let registry = ConsumerRegistry::default();
        let kept = Arc::new(Recorder::default());
        registry.register(Arc::downgrade(&kept) as Weak<dyn BridgeConsumer>);
        {
            let dropped = Arc::new(Recorder::default());
            registry.register(Arc::downgrade(&dropped) as Weak<dyn BridgeConsumer>);
            assert_eq!(registry.len(), 2);
        }

        registry.broadcast_event(&power_on());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries.read().len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = ConsumerRegistry::default();
        let recorder = Arc::new(Recorder::default());
        let id = registry.register(Arc::downgrade(&recorder) as Weak<dyn BridgeConsumer>);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));

        registry.broadcast_event(&power_on());
        assert!(recorder.events.lock().is_empty());
    }

    #[test]
    fn test_closure_discovery_consumer() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let consumer: Arc<dyn DiscoveryConsumer> = Arc::new(move |scan: DiscoveryScan| {
            *sink.lock() = Some(scan.terminated);
        });
        consumer.on_devices_found(DiscoveryScan {
            terminated: true,
            ..Default::default()
        });
        assert_eq!(*seen.lock(), Some(true));
    }
}
