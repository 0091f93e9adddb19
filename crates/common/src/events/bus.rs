//! A small typed event bus with opaque subscription handles.
//!
//! Listeners are invoked synchronously in registration order. A
//! panicking listener is isolated: it is caught, logged, and the
//! remaining listeners still run. Removal is by subscription handle
//! identity, never by index. The registry lives for the process and
//! has no persistence.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Opaque handle identifying one registered listener.
///
/// Holding the handle is the only way to remove the listener; dropping
/// it does NOT unsubscribe (collaborators tear down explicitly).
#[derive(Debug, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
}

struct BusInner<T> {
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
}

/// Clonable handle to a process-wide listener registry for one topic.
pub struct EventBus<T> {
    inner: Arc<BusInner<T>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventBus<T> {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a listener; the returned handle removes it later.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        Subscription { id }
    }

    /// Remove the listener identified by `subscription`.
    ///
    /// Returns `false` when the listener was already removed.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription.id);
        listeners.len() != before
    }

    /// Invoke every listener with `payload`, in registration order.
    ///
    /// The registry lock is released before any listener runs, so
    /// listeners may subscribe or unsubscribe reentrantly; such changes
    /// take effect on the next emit.
    pub fn emit(&self, payload: &T) {
        let snapshot: Vec<Listener<T>> =
            self.inner.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(payload))).is_err() {
                warn!("event listener panicked; continuing with remaining listeners");
            }
        }
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    #[test]
    fn listeners_run_in_registration_order() {
        let bus: EventBus<u32> = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        bus.subscribe(move |value: &u32| first.lock().push(("first", *value)));
        let second = Arc::clone(&order);
        bus.subscribe(move |value: &u32| second.lock().push(("second", *value)));

        bus.emit(&7);

        assert_eq!(*order.lock(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn unsubscribe_removes_by_handle_identity() {
        let bus: EventBus<()> = EventBus::new();
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let keep = bus.subscribe(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let removed = bus.subscribe(|()| {});

        assert!(bus.unsubscribe(&removed));
        assert!(!bus.unsubscribe(&removed), "second removal is a no-op");
        assert_eq!(bus.listener_count(), 1);

        bus.emit(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(bus.unsubscribe(&keep));
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn panicking_listener_does_not_stop_the_rest() {
        let bus: EventBus<()> = EventBus::new();
        let calls = Arc::new(AtomicU32::new(0));

        bus.subscribe(|()| panic!("listener failure"));
        let counter = Arc::clone(&calls);
        bus.subscribe(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_one_registry() {
        let bus: EventBus<u32> = EventBus::new();
        let other = bus.clone();
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        other.emit(&1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(other.listener_count(), 1);
    }
}
