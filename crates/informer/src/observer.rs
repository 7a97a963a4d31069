//! Observer registration and dispatch.
//!
//! Every normalized change is delivered synchronously to each registered
//! observer, in registration order, before the mirror applies the next
//! event.
//!
//! Known limitation: there is no per-observer queue. A slow observer
//! throttles the whole pipeline for its resource type, so callbacks must
//! return promptly and hand long work off to their own tasks.

use crate::event::ChangeEvent;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// Receives notifications about changes to one resource type.
pub trait ResourceObserver<K>: Send + Sync {
    /// A new object appeared in the cache.
    fn on_add(&self, obj: &K);

    /// A cached object changed. `old` is the value the cache held before.
    fn on_update(&self, old: &K, new: &K);

    /// An object left the cache. Carries the last known state.
    fn on_delete(&self, obj: &K);

    /// A full list (initial or resync) has been delivered.
    fn on_synced(&self) {}
}

struct Registered<K> {
    name: String,
    observer: Arc<dyn ResourceObserver<K>>,
}

/// Ordered set of observers for one mirror.
pub struct ObserverRegistry<K> {
    resource: String,
    observers: Vec<Registered<K>>,
}

impl<K> std::fmt::Debug for ObserverRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("resource", &self.resource)
            .field("observers", &self.names())
            .finish()
    }
}

impl<K> ObserverRegistry<K> {
    /// Empty registry for `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            observers: Vec::new(),
        }
    }

    /// Append an observer. Dispatch follows registration order.
    pub fn register(&mut self, name: impl Into<String>, observer: Arc<dyn ResourceObserver<K>>) {
        self.observers.push(Registered {
            name: name.into(),
            observer,
        });
    }

    /// Observer names in dispatch order.
    pub fn names(&self) -> Vec<&str> {
        self.observers.iter().map(|r| r.name.as_str()).collect()
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver one change to every observer.
    pub fn dispatch(&self, event: &ChangeEvent<K>) {
        for registered in &self.observers {
            let observer = &registered.observer;
            self.guarded(&registered.name, event.kind(), || match event {
                ChangeEvent::Added(obj) => observer.on_add(obj),
                ChangeEvent::Updated { old, new } => observer.on_update(old, new),
                ChangeEvent::Deleted(obj) => observer.on_delete(obj),
            });
        }
    }

    /// Tell every observer that a full list has been delivered.
    pub fn dispatch_synced(&self) {
        for registered in &self.observers {
            let observer = &registered.observer;
            self.guarded(&registered.name, "synced", || observer.on_synced());
        }
    }

    // A panicking observer must not keep the next observer from seeing the event.
    fn guarded(&self, name: &str, event: &str, call: impl FnOnce()) {
        if catch_unwind(AssertUnwindSafe(call)).is_err() {
            error!(
                resource = %self.resource,
                observer = %name,
                event,
                "Observer panicked; continuing with the next observer"
            );
        }
    }
}
