//! Multi-reason locks
//!
//! A `MultiLock` is a set of independent boolean locks over a fixed set of
//! reasons. The lock is active while any reason is held. There is no priority
//! between reasons; any one of them blocks whatever the lock guards.
//!
//! Locking a reason twice counts once, and so does unlocking. Using a reason
//! outside the allowed set is a wiring mistake and fails loudly.

use std::fmt::Debug;
use std::hash::Hash;

use indexmap::IndexSet;

use crate::error::{Error, Result};

/// A closed set of reasons a lock can be held for.
pub trait LockReason: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every reason of this kind.
    const ALL: &'static [Self];
}

/// Why a slot is paused. Pausing stops both delivery and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PauseReason {
    /// Paused by its owner.
    Generic,
    /// Waiting for another signal to fire for the first time.
    CrossSignal,
}

impl LockReason for PauseReason {
    const ALL: &'static [Self] = &[Self::Generic, Self::CrossSignal];
}

/// Why a slot is delayed. Delays run out on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelayReason {
    /// Waiting for ticks before the duration counter starts.
    Duration,
    /// Swallowing matching dispatches before delivery starts.
    Invocation,
}

impl LockReason for DelayReason {
    const ALL: &'static [Self] = &[Self::Duration, Self::Invocation];
}

/// A set of independently toggleable locks.
#[derive(Debug, Clone)]
pub struct MultiLock<R: LockReason> {
    allowed: IndexSet<R>,
    locked: IndexSet<R>,
}

impl<R: LockReason> MultiLock<R> {
    /// A lock accepting every reason of `R`.
    pub fn new() -> Self {
        Self::restricted(R::ALL.iter().copied())
    }

    /// A lock accepting only the given reasons.
    pub fn restricted(allowed: impl IntoIterator<Item = R>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            locked: IndexSet::new(),
        }
    }

    fn ensure_allowed(&self, reason: R) -> Result<()> {
        if self.allowed.contains(&reason) {
            Ok(())
        } else {
            Err(Error::unknown_reason(reason))
        }
    }

    /// Hold `reason`.
    pub fn lock(&mut self, reason: R) -> Result<()> {
        self.ensure_allowed(reason)?;
        self.locked.insert(reason);
        Ok(())
    }

    /// Release `reason`.
    pub fn unlock(&mut self, reason: R) -> Result<()> {
        self.ensure_allowed(reason)?;
        self.locked.shift_remove(&reason);
        Ok(())
    }

    /// Whether `reason` is currently held.
    pub fn has_lock(&self, reason: R) -> Result<bool> {
        self.ensure_allowed(reason)?;
        Ok(self.locked.contains(&reason))
    }

    /// True if any reason is held.
    pub fn is_active(&self) -> bool {
        !self.locked.is_empty()
    }

    /// Held reasons, in the order they were locked.
    pub fn locked(&self) -> impl Iterator<Item = R> + '_ {
        self.locked.iter().copied()
    }
}

impl<R: LockReason> Default for MultiLock<R> {
    fn default() -> Self {
        Self::new()
    }
}
