//! In-process fan-out of notification events.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{error, trace};

use crate::domain::entities::NotificationEvent;

type Listener = dyn Fn(&NotificationEvent) + Send + Sync;

#[derive(Default)]
struct BusInner {
    listeners: Mutex<Vec<(u64, Arc<Listener>)>>,
    next_id: AtomicU64,
}

/// Fans each published event out to every registered listener.
///
/// Publishing snapshots the listener set and invokes listeners outside the
/// lock, so a listener may unsubscribe (itself or others) from inside its
/// callback. A panicking listener is isolated and does not stop delivery
/// to the rest.
#[derive(Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its registration handle.
    ///
    /// The listener receives every event published while the handle is
    /// alive; dropping the handle (or calling [`Subscription::unsubscribe`])
    /// removes it.
    pub fn subscribe(
        &self,
        listener: impl Fn(&NotificationEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Arc<Listener> = Arc::new(listener);
        self.inner.listeners.lock().push((id, listener));

        trace!(id, "Listener registered");

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Delivers `event` to every currently registered listener exactly once.
    pub fn publish(&self, event: &NotificationEvent) {
        let snapshot: Vec<Arc<Listener>> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!("Notification listener panicked");
            }
        }
    }

    /// Removes every listener registration.
    pub fn clear(&self) {
        self.inner.listeners.lock().clear();
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Returns whether no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registration handle returned by [`EventBus::subscribe`].
///
/// The owning screen must release it on unmount; dropping it unsubscribes.
#[must_use = "dropping the handle unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Removes the listener. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
            trace!(id = self.id, "Listener removed");
        }
    }
}
