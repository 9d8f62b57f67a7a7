//! Per-entity modifier bookkeeping.
//!
//! Effects that should exist at most once per entity (a poison, an aura)
//! keep their slot handle here. Applying the effect again replaces the old
//! handle, which is deactivated first so two copies never overlap.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::signal::SlotHandle;

/// Shared map from entity to its live modifier.
pub struct ModifierHandles<K> {
    handles: Arc<Mutex<HashMap<K, SlotHandle>>>,
}

impl<K: Eq + Hash> ModifierHandles<K> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            handles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Track `handle` for `key`, deactivating whatever was there.
    ///
    /// Returns the previous handle.
    pub fn replace(&self, key: K, handle: SlotHandle) -> Option<SlotHandle> {
        let previous = self.handles.lock().insert(key, handle);
        // Finalizers run user code; the map is unlocked by now.
        if let Some(previous) = &previous {
            previous.deactivate();
        }
        previous
    }

    /// Deactivate and forget the handle for `key`.
    ///
    /// Returns true if a live modifier was cancelled.
    pub fn cancel(&self, key: &K) -> bool {
        let removed = self.handles.lock().remove(key);
        removed.map_or(false, |handle| handle.deactivate())
    }

    /// The tracked handle for `key`, live or not.
    pub fn get(&self, key: &K) -> Option<SlotHandle> {
        self.handles.lock().get(key).cloned()
    }

    /// Whether `key` has a modifier that is still alive.
    pub fn is_active(&self, key: &K) -> bool {
        self.handles
            .lock()
            .get(key)
            .map_or(false, SlotHandle::is_active)
    }

    /// Drop handles whose slots have died. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let mut handles = self.handles.lock();
        let before = handles.len();
        handles.retain(|_, handle| handle.is_active());
        before - handles.len()
    }

    /// Number of tracked handles, including dead ones not yet swept.
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}

impl<K: Eq + Hash> Default for ModifierHandles<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for ModifierHandles<K> {
    fn clone(&self) -> Self {
        Self {
            handles: Arc::clone(&self.handles),
        }
    }
}

impl<K> fmt::Debug for ModifierHandles<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierHandles")
            .field("len", &self.handles.lock().len())
            .finish()
    }
}
