//! Callback types for slots.
//!
//! A slot carries up to three user functions:
//!
//! - the callback, invoked with a mutable payload on delivery
//! - an optional check, a predicate deciding whether a dispatch matches
//! - an optional finalizer, run exactly once when the slot deactivates
//!
//! Closures have no usable identity in Rust, so every `Callback` gets a
//! `CallbackId` when it is created. Clones share the id. A signal keys its
//! subscriptions by this id: connecting a clone of a connected callback
//! replaces the earlier subscription.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of a callback, shared by all of its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

impl CallbackId {
    /// Generate a new unique callback ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for CallbackId {
    fn default() -> Self {
        Self::new()
    }
}

/// Function invoked with the payload when a slot delivers.
pub struct Callback<T> {
    id: CallbackId,
    run: Arc<dyn Fn(&mut T) + Send + Sync>,
}

impl<T> Callback<T> {
    /// Wrap a function as a callback with a fresh identity.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        Self {
            id: CallbackId::new(),
            run: Arc::new(run),
        }
    }

    /// Get the callback's identity.
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Invoke the callback.
    pub fn call(&self, payload: &mut T) {
        (self.run)(payload);
    }
}

impl<T> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            run: Arc::clone(&self.run),
        }
    }
}

impl<T> fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("id", &self.id).finish()
    }
}

/// Predicate deciding whether a dispatch matches a slot.
pub type Check<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Teardown run once when a slot deactivates.
pub type Finalizer = Box<dyn FnOnce() + Send>;
