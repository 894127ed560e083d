//! Synchronous notification fan-out.

use crate::id::SubscriptionId;
use std::sync::{Arc, Mutex, PoisonError};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A subscription registry that fires handlers synchronously, in
/// subscription order.
///
/// Handlers are invoked with no internal lock held, so a handler may
/// subscribe, unsubscribe, or emit again from within its own callback.
pub struct Emitter<T> {
    handlers: Mutex<Vec<(SubscriptionId, Handler<T>)>>,
}

impl<T> Emitter<T> {
    /// Create an emitter with no subscribers.
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Register a handler; returns the key used to remove it.
    pub fn on(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.guard().push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if the subscription was not found.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.guard();
        match handlers.iter().position(|(sub, _)| *sub == id) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Invoke every handler with `value`, in subscription order.
    pub fn emit(&self, value: &T) {
        let handlers: Vec<Handler<T>> = self
            .guard()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(value);
        }
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// True if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Handler<T>)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("subscriptions", &self.len())
            .finish()
    }
}
