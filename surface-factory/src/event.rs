//! Explicit subscriber registries for device notifications.
//!
//! Every notification in the crate is an [`EventHandlers`] map from
//! [`SubscriptionId`] to callback. Subscribers keep the id and must hand it
//! back on teardown; nothing is dropped implicitly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Registry of callbacks for one event type.
pub struct EventHandlers<E> {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<SubscriptionId, Handler<E>>>,
}

impl<E> EventHandlers<E> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a callback.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().insert(id, Arc::new(handler));
        id
    }

    /// Remove a callback. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.handlers.write().remove(&id).is_some()
    }

    /// Invoke every registered callback on the current thread.
    ///
    /// Callbacks run against a snapshot taken before the first call, so a
    /// callback may subscribe or unsubscribe without deadlocking.
    pub fn raise(&self, event: &E) {
        let snapshot: Vec<Handler<E>> = {
            let handlers = self.handlers.read();
            let mut ordered: Vec<_> = handlers.iter().collect();
            ordered.sort_by_key(|(id, _)| **id);
            ordered.into_iter().map(|(_, h)| Arc::clone(h)).collect()
        };
        for handler in snapshot {
            handler(event);
        }
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether no callback is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Drop every callback.
    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}

impl<E> Default for EventHandlers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventHandlers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("subscribers", &self.len())
            .finish()
    }
}
