//! Multicast event handlers.
//!
//! An [`EventBridge`] is the Rust side of one native callback: the native
//! layer calls in once per event, and the bridge fans the event out to every
//! subscribed handler, in subscription order, on the calling thread.
//!
//! Handlers can be added and removed from any thread while events are being
//! fired. A firing sees the handler list as it was when the firing started.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
};

/// Identifies one subscription for [`EventBridge::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Ordered set of handlers for one event category.
pub struct EventBridge<E> {
    handlers: RwLock<Vec<(SubscriptionId, Handler<E>)>>,
    next_id: AtomicU64,
}

impl<E> Default for EventBridge<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventBridge<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBridge")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<E> EventBridge<E> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Adds a handler after every existing one.
    ///
    /// Handlers run on the native delivery thread and should return quickly;
    /// the next event of the same category is not delivered until they do.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Removes a handler. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        match handlers.iter().position(|(existing, _)| *existing == id) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }

    /// Removes every handler.
    pub fn clear(&self) {
        self.handlers.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Builds the event with `make` and delivers it to every handler.
    ///
    /// `make` is not called when there are no handlers. The lock is released
    /// before any handler runs, so handlers may subscribe or unsubscribe.
    ///
    /// Returns whether the event was delivered.
    pub(crate) fn fire_with(&self, make: impl FnOnce() -> E) -> bool {
        let snapshot: Vec<Handler<E>> = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            if handlers.is_empty() {
                return false;
            }
            handlers.iter().map(|(_, handler)| Arc::clone(handler)).collect()
        };

        let event = make();
        for handler in &snapshot {
            handler(&event);
        }
        true
    }
}
