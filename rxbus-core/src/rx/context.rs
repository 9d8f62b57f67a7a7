//! Running context for value folds.
//!
//! An `RxContext` is the payload a reactive value broadcasts on its private
//! signal. It starts with the baseline as its only history entry. Each
//! modifier reads `current()` and may `append` a new value; the next
//! modifier in sequence order sees that value as its input.

use std::fmt;

/// Accumulator threaded through the modifiers of one request.
pub struct RxContext<K, V> {
    /// Never empty.
    history: Vec<V>,
    target: K,
}

impl<K, V> RxContext<K, V> {
    pub fn new(value: V, target: K) -> Self {
        Self {
            history: vec![value],
            target,
        }
    }

    /// The most recent value.
    pub fn current(&self) -> &V {
        &self.history[self.history.len() - 1]
    }

    /// Push a new value for later modifiers.
    pub fn append(&mut self, value: V) {
        self.history.push(value);
    }

    /// The entity this fold is computing a value for.
    pub fn target(&self) -> &K {
        &self.target
    }

    /// Every value so far, oldest first.
    pub fn history(&self) -> &[V] {
        &self.history
    }

    /// How many modifiers appended a value.
    pub fn steps(&self) -> usize {
        self.history.len() - 1
    }

    /// Consume the context, yielding the final value.
    pub fn into_current(mut self) -> V {
        let last = self.history.len() - 1;
        self.history.swap_remove(last)
    }
}

impl<K, V: Clone> RxContext<K, V> {
    /// Append a value derived from the current one.
    pub fn map(&mut self, f: impl FnOnce(&V) -> V) {
        let next = f(self.current());
        self.history.push(next);
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for RxContext<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RxContext")
            .field("target", &self.target)
            .field("history", &self.history)
            .finish()
    }
}
