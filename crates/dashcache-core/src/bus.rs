//! Synchronous publish/subscribe for service change events.
//!
//! Callbacks run in subscription order on the notifying thread. A panic in
//! one callback is caught and logged so the remaining subscribers still
//! receive the event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::error;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    listeners: Vec<(u64, Callback<E>)>,
}

impl<E> Registry<E> {
    fn contains(&self, id: u64) -> bool {
        self.listeners.iter().any(|(listener, _)| *listener == id)
    }
}

pub struct NotificationBus<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

/// Handle returned by [`NotificationBus::subscribe`].
///
/// Dropping the handle keeps the callback registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "keep the subscription to be able to unsubscribe later"]
pub struct Subscription<E> {
    id: u64,
    registry: Weak<Mutex<Registry<E>>>,
}

impl<E> Subscription<E> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the callback. Returns false if it was already gone (bus
    /// cleared or dropped).
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|(id, _)| *id != self.id);
        registry.listeners.len() != before
    }
}

impl<E> NotificationBus<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.push((id, Arc::new(callback)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every current subscriber and return how many
    /// callbacks completed without panicking.
    pub fn notify(&self, event: &E) -> usize {
        // Snapshot so callbacks may subscribe/unsubscribe without deadlocking.
        let snapshot: Vec<(u64, Callback<E>)> = self.registry.lock().listeners.clone();

        let mut delivered = 0;
        for (id, callback) in snapshot {
            if !self.registry.lock().contains(id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(subscriber = id, %reason, "Subscriber panicked during notify");
                }
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.registry.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.registry.lock().listeners.clear();
    }
}

impl<E> Default for NotificationBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
