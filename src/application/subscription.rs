//! Snapshot publish/subscribe bus
//!
//! Observers are told that state changed and re-read the snapshot. The
//! stored snapshot keeps its `Arc` identity until a field actually changes,
//! so `Arc::ptr_eq` is a valid "nothing changed" test.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use super::lock;

type Listener = Arc<dyn Fn() + Send + Sync>;

struct BusState<T> {
    current: Arc<T>,
    listeners: Vec<(u64, Listener)>,
    next_id: u64,
}

/// Shared snapshot plus its observers. Performs no mutation of its own
/// beyond storing what it is given.
pub struct SnapshotBus<T> {
    state: Arc<Mutex<BusState<T>>>,
}

impl<T> SnapshotBus<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                current: Arc::new(initial),
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Last stored snapshot
    pub fn snapshot(&self) -> Arc<T> {
        Arc::clone(&lock(&self.state).current)
    }

    /// Store `value`, keeping the existing `Arc` when nothing changed
    pub fn store(&self, value: T) -> Arc<T> {
        let mut state = lock(&self.state);
        if *state.current != value {
            state.current = Arc::new(value);
        }
        Arc::clone(&state.current)
    }

    /// Store `value` and notify every subscriber
    pub fn publish(&self, value: T) -> Arc<T> {
        let snapshot = self.store(value);
        self.notify();
        snapshot
    }

    /// Invoke every subscriber. Runs outside the bus lock, so callbacks may
    /// read the snapshot or (un)subscribe. A panicking callback is logged
    /// and skipped.
    pub fn notify(&self) {
        let listeners: Vec<Listener> = lock(&self.state)
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
                tracing::warn!("snapshot subscriber panicked; continuing");
            }
        }
    }

    /// Register `callback`. It stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    #[must_use = "dropping the Subscription unregisters the callback"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = {
            let mut state = lock(&self.state);
            let id = state.next_id;
            state.next_id += 1;
            state.listeners.push((id, Arc::new(callback)));
            id
        };

        let weak: Weak<Mutex<BusState<T>>> = Arc::downgrade(&self.state);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(state) = weak.upgrade() {
                    lock(&state).listeners.retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }
}

/// Registration handle returned by [`SnapshotBus::subscribe`]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Unregister now
    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }

    /// Keep the callback registered for the lifetime of the bus
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn store_keeps_identity_when_unchanged() {
        let bus = SnapshotBus::new(1u32);
        let first = bus.snapshot();
        let again = bus.store(1);
        assert!(Arc::ptr_eq(&first, &again));

        let changed = bus.store(2);
        assert!(!Arc::ptr_eq(&first, &changed));
        assert_eq!(*changed, 2);
    }

    #[test]
    fn publish_notifies_every_subscriber() {
        let bus = SnapshotBus::new(0u32);
        let (a, fa) = counter();
        let (b, fb) = counter();
        let _sa = bus.subscribe(fa);
        let _sb = bus.subscribe(fb);

        bus.publish(1);
        bus.publish(1);
        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let bus = SnapshotBus::new(0u32);
        let (count, f) = counter();
        let sub = bus.subscribe(f);
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        bus.publish(5);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_only_removes_own_callback() {
        let bus = SnapshotBus::new(0u32);
        let (a, fa) = counter();
        let (b, fb) = counter();
        let sa = bus.subscribe(fa);
        let _sb = bus.subscribe(fb);

        sa.unsubscribe();
        bus.publish(1);
        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detached_subscription_survives() {
        let bus = SnapshotBus::new(0u32);
        let (count, f) = counter();
        bus.subscribe(f).detach();
        bus.publish(1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_subscriber_does_not_break_others() {
        let bus = SnapshotBus::new(0u32);
        let _bad = bus.subscribe(|| panic!("boom"));
        let (count, f) = counter();
        let _good = bus.subscribe(f);

        bus.publish(3);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(*bus.snapshot(), 3);
    }

    #[test]
    fn subscriber_can_read_snapshot_during_notify() {
        let bus = Arc::new(SnapshotBus::new(0u32));
        let seen = Arc::new(AtomicUsize::new(0));
        let reader = Arc::clone(&bus);
        let seen_clone = Arc::clone(&seen);
        let _sub = bus.subscribe(move || {
            seen_clone.store(*reader.snapshot() as usize, Ordering::SeqCst);
        });

        bus.publish(7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }
}
