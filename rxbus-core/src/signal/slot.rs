//! Slot Implementation
//!
//! A slot is one subscription on a signal. Besides its callback it carries
//! its own lifecycle:
//!
//! - `active`: once false, never true again
//! - `paused`: a `MultiLock<PauseReason>`; a paused slot neither delivers
//!   nor counts
//! - `delayed`: a `MultiLock<DelayReason>`; a delayed slot does not deliver
//!   but runs its delay counters down
//! - four counters: duration, invocations and a delay for each
//!
//! # Dispatch
//!
//! A dispatch runs these gates in order:
//!
//! 1. Inactive slots do nothing.
//! 2. A failing check means "no match": nothing is counted.
//! 3. Paused slots stop here.
//! 4. Delayed slots consume one step of the invocation delay, if any.
//! 5. Otherwise the callback runs and one invocation is consumed.
//!
//! # Deactivation
//!
//! A slot deactivates when a counter reaches zero, when `deactivate` is
//! called, or when the bus resolves an end dependency. The finalizer runs
//! exactly once, on whichever of these comes first. Pause and delay locks
//! are never set as a side effect of each other.
//!
//! Locks are never held while user code (callback, check, finalizer) runs,
//! so user code may freely reach back into the slot or its signal.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::callback::{Callback, CallbackId, Check, Finalizer};
use super::lock::{DelayReason, MultiLock, PauseReason};
use crate::config::SlotOptions;
use crate::error::Result;

/// Unique identifier for a slot. Slot identity never derives from its
/// callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u64);

impl SlotId {
    /// Generate a new unique slot ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot:{}", self.0)
    }
}

/// Outcome of the gates a dispatch passes before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Closed,
    Delayed,
    Open,
}

struct SlotState {
    active: bool,
    paused: MultiLock<PauseReason>,
    delayed: MultiLock<DelayReason>,
    duration: i64,
    invocations: i64,
    duration_delay: i64,
    invocation_delay: i64,
    finalizer: Option<Finalizer>,
}

impl SlotState {
    /// Set or clear a delay reason. Slot locks accept every reason.
    fn set_delay(&mut self, reason: DelayReason, on: bool) {
        let result = if on {
            self.delayed.lock(reason)
        } else {
            self.delayed.unlock(reason)
        };
        if let Err(err) = result {
            tracing::warn!(%err, "slot delay lock rejected reason");
        }
    }

    fn can_count(&self) -> bool {
        self.active && !self.paused.is_active()
    }
}

/// The type-independent part of a slot: its identity and lifecycle.
///
/// Handles are cheap to clone and all clones share state. The bus keeps
/// handles in its dependency tables; callers keep them to cancel a
/// subscription early.
#[derive(Clone)]
pub struct SlotHandle {
    id: SlotId,
    state: Arc<Mutex<SlotState>>,
}

impl SlotHandle {
    /// Create a live slot lifecycle from `options`.
    ///
    /// Options with an exhausted counter produce a slot that is already
    /// inactive; its finalizer has run by the time this returns.
    pub fn new(options: SlotOptions, finalizer: Option<Finalizer>) -> Result<Self> {
        options.validate()?;

        let handle = Self {
            id: SlotId::new(),
            state: Arc::new(Mutex::new(SlotState {
                active: true,
                paused: MultiLock::new(),
                delayed: MultiLock::new(),
                duration: options.duration,
                invocations: options.invocations,
                duration_delay: 0,
                invocation_delay: 0,
                finalizer,
            })),
        };
        handle.update(options)?;

        Ok(handle)
    }

    /// Get the slot's unique ID.
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Replace every counter. Rejected with `Ok(false)` once inactive.
    ///
    /// Delay locks follow the new delay counters. An exhausted counter
    /// deactivates the slot.
    pub fn update(&self, options: SlotOptions) -> Result<bool> {
        options.validate()?;

        {
            let mut state = self.state.lock();
            if !state.active {
                return Ok(false);
            }

            state.duration = options.duration;
            state.invocations = options.invocations;
            state.duration_delay = options.duration_delay;
            state.invocation_delay = options.invocation_delay;
            state.set_delay(DelayReason::Duration, options.duration_delay > 0);
            state.set_delay(DelayReason::Invocation, options.invocation_delay > 0);
        }

        if options.is_exhausted() {
            self.deactivate_with("exhausted on update");
        }
        Ok(true)
    }

    /// Current counters.
    pub fn options(&self) -> SlotOptions {
        let state = self.state.lock();
        SlotOptions {
            duration: state.duration,
            invocations: state.invocations,
            duration_delay: state.duration_delay,
            invocation_delay: state.invocation_delay,
        }
    }

    /// Ticks left before the slot expires, -1 if unlimited.
    pub fn remaining_duration(&self) -> i64 {
        self.state.lock().duration
    }

    /// Deliveries left before the slot expires, -1 if unlimited.
    pub fn remaining_invocations(&self) -> i64 {
        self.state.lock().invocations
    }

    /// Ticks left before duration counting starts.
    pub fn remaining_duration_delay(&self) -> i64 {
        self.state.lock().duration_delay
    }

    /// Matches left before delivery starts.
    pub fn remaining_invocation_delay(&self) -> i64 {
        self.state.lock().invocation_delay
    }

    /// Whether the slot is still alive.
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Whether any pause reason is held.
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused.is_active()
    }

    /// Whether any delay reason is held.
    pub fn is_delayed(&self) -> bool {
        self.state.lock().delayed.is_active()
    }

    /// Active, not paused and not delayed.
    pub fn is_callable(&self) -> bool {
        let state = self.state.lock();
        state.active && !state.paused.is_active() && !state.delayed.is_active()
    }

    /// Whether `reason` is currently pausing the slot.
    pub fn has_pause(&self, reason: PauseReason) -> Result<bool> {
        self.state.lock().paused.has_lock(reason)
    }

    /// Whether `reason` is currently delaying the slot.
    pub fn has_delay(&self, reason: DelayReason) -> Result<bool> {
        self.state.lock().delayed.has_lock(reason)
    }

    /// Hold a pause reason. Returns false if the slot is inactive.
    pub fn pause(&self, reason: PauseReason) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.active {
            return Ok(false);
        }
        state.paused.lock(reason)?;
        Ok(true)
    }

    /// Release a pause reason. Returns false if the slot is inactive.
    pub fn resume(&self, reason: PauseReason) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.active {
            return Ok(false);
        }
        state.paused.unlock(reason)?;
        Ok(true)
    }

    /// Hold a delay reason without touching the delay counters.
    pub fn delay(&self, reason: DelayReason) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.active {
            return Ok(false);
        }
        state.delayed.lock(reason)?;
        Ok(true)
    }

    /// Release a delay reason without touching the delay counters.
    pub fn undelay(&self, reason: DelayReason) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.active {
            return Ok(false);
        }
        state.delayed.unlock(reason)?;
        Ok(true)
    }

    /// Deactivate the slot for good, running its finalizer.
    ///
    /// Returns true if this call did the deactivation; later calls are
    /// no-ops returning false.
    pub fn deactivate(&self) -> bool {
        self.deactivate_with("explicit")
    }

    pub(crate) fn deactivate_with(&self, cause: &'static str) -> bool {
        let finalizer = {
            let mut state = self.state.lock();
            if !state.active {
                return false;
            }
            state.active = false;
            state.finalizer.take()
        };

        tracing::trace!(slot = self.id.raw(), cause, "slot deactivated");

        if let Some(finalizer) = finalizer {
            finalizer();
        }
        true
    }

    /// Age the slot by one time step.
    ///
    /// Paused and inactive slots do not age. A pending duration delay is
    /// consumed first; duration counting starts on the tick after it runs
    /// out.
    pub fn tick(&self) {
        let expired = {
            let mut state = self.state.lock();
            if !state.can_count() {
                return;
            }

            if state.duration_delay > 0 {
                state.duration_delay -= 1;
                if state.duration_delay == 0 {
                    state.set_delay(DelayReason::Duration, false);
                }
                false
            } else if state.duration > 0 {
                state.duration -= 1;
                state.duration == 0
            } else {
                false
            }
        };

        if expired {
            self.deactivate_with("duration expired");
        }
    }

    fn gate(&self) -> Gate {
        let state = self.state.lock();
        if !state.can_count() {
            Gate::Closed
        } else if state.delayed.is_active() {
            Gate::Delayed
        } else {
            Gate::Open
        }
    }

    /// Count one matching dispatch.
    ///
    /// A pending invocation delay absorbs the match. Otherwise a delivered
    /// match consumes one invocation.
    fn count_match(&self, delivered: bool) {
        let exhausted = {
            let mut state = self.state.lock();
            if !state.can_count() {
                return;
            }

            if state.invocation_delay > 0 {
                state.invocation_delay -= 1;
                if state.invocation_delay == 0 {
                    state.set_delay(DelayReason::Invocation, false);
                }
                false
            } else if delivered && state.invocations > 0 {
                state.invocations -= 1;
                state.invocations == 0
            } else {
                false
            }
        };

        if exhausted {
            self.deactivate_with("invocations exhausted");
        }
    }
}

impl PartialEq for SlotHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SlotHandle {}

impl Hash for SlotHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for SlotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SlotHandle")
            .field("id", &self.id)
            .field("active", &state.active)
            .field("paused", &state.paused.is_active())
            .field("delayed", &state.delayed.is_active())
            .field("duration", &state.duration)
            .field("invocations", &state.invocations)
            .finish()
    }
}

/// Everything needed to build a slot.
///
/// # Example
///
/// ```rust
/// use rxbus_core::signal::{Slot, SlotSpec};
///
/// let slot = Slot::new(
///     SlotSpec::new(|hits: &mut i32| *hits += 1)
///         .check(|hits: &i32| *hits < 10)
///         .invocations(2),
/// )
/// .unwrap();
///
/// let mut hits = 0;
/// assert!(slot.dispatch(&mut hits));
/// assert!(slot.dispatch(&mut hits));
/// assert!(!slot.is_active());
/// ```
pub struct SlotSpec<T> {
    callback: Callback<T>,
    check: Option<Check<T>>,
    finalizer: Option<Finalizer>,
    options: SlotOptions,
}

impl<T> SlotSpec<T> {
    /// Start a spec with unlimited options.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        Self::from_callback(Callback::new(callback))
    }

    /// Build from an existing callback, keeping its identity.
    pub fn from_callback(callback: Callback<T>) -> Self {
        Self {
            callback,
            check: None,
            finalizer: None,
            options: SlotOptions::default(),
        }
    }

    /// Only deliver payloads the predicate accepts.
    pub fn check<F>(mut self, check: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
        self
    }

    /// Share an existing predicate.
    pub fn check_with(mut self, check: Check<T>) -> Self {
        self.check = Some(check);
        self
    }

    /// Run `finalizer` once, when the slot deactivates.
    pub fn finally<F>(mut self, finalizer: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.finalizer = Some(Box::new(finalizer));
        self
    }

    /// Replace every counter at once.
    pub fn options(mut self, options: SlotOptions) -> Self {
        self.options = options;
        self
    }

    /// Expire after this many ticks.
    pub fn duration(mut self, duration: i64) -> Self {
        self.options.duration = duration;
        self
    }

    /// Expire after this many deliveries.
    pub fn invocations(mut self, invocations: i64) -> Self {
        self.options.invocations = invocations;
        self
    }

    /// Hold off delivery and aging for this many ticks.
    pub fn duration_delay(mut self, delay: i64) -> Self {
        self.options.duration_delay = delay;
        self
    }

    /// Skip this many matches before delivering.
    pub fn invocation_delay(mut self, delay: i64) -> Self {
        self.options.invocation_delay = delay;
        self
    }

    /// Identity of the callback this spec will connect.
    pub fn callback_id(&self) -> CallbackId {
        self.callback.id()
    }
}

impl<T> fmt::Debug for SlotSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotSpec")
            .field("callback", &self.callback)
            .field("has_check", &self.check.is_some())
            .field("has_finalizer", &self.finalizer.is_some())
            .field("options", &self.options)
            .finish()
    }
}

/// A subscription for payloads of type `T`.
///
/// Derefs to its [`SlotHandle`] for lifecycle control.
pub struct Slot<T> {
    handle: SlotHandle,
    callback: Callback<T>,
    check: Option<Check<T>>,
}

impl<T> Slot<T> {
    pub fn new(spec: SlotSpec<T>) -> Result<Self> {
        let handle = SlotHandle::new(spec.options, spec.finalizer)?;
        Ok(Self {
            handle,
            callback: spec.callback,
            check: spec.check,
        })
    }

    /// The untyped lifecycle handle.
    pub fn handle(&self) -> SlotHandle {
        self.handle.clone()
    }

    pub fn callback(&self) -> &Callback<T> {
        &self.callback
    }

    pub fn callback_id(&self) -> CallbackId {
        self.callback.id()
    }

    /// Offer a payload to the slot. Returns true if the callback ran.
    pub fn dispatch(&self, payload: &mut T) -> bool {
        if !self.handle.is_active() {
            return false;
        }

        if let Some(check) = &self.check {
            if !check(payload) {
                return false;
            }
        }

        match self.handle.gate() {
            Gate::Closed => false,
            Gate::Delayed => {
                self.handle.count_match(false);
                false
            }
            Gate::Open => {
                self.callback.call(payload);
                self.handle.count_match(true);
                true
            }
        }
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            callback: self.callback.clone(),
            check: self.check.clone(),
        }
    }
}

impl<T> Deref for Slot<T> {
    type Target = SlotHandle;

    fn deref(&self) -> &SlotHandle {
        &self.handle
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("handle", &self.handle)
            .field("callback", &self.callback)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
