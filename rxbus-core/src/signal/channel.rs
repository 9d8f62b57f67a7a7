//! Signal Implementation
//!
//! A signal is an ordered registry of slots for one payload type. Every
//! connected slot gets a sequence number, and `emit` offers the payload to
//! the slots in ascending sequence order. Each slot sees the payload as the
//! previous slot left it.
//!
//! # Ordering
//!
//! Sequence numbers are never reused while the signal lives. By default a
//! signal numbers its own slots; signals built with a shared
//! [`OrderAssigner`] draw from one counter, so slots across those signals
//! carry a single global order.
//!
//! # Reentrancy
//!
//! `emit` and `tick` work on a snapshot of the slot list, taken before any
//! slot runs. Callbacks may connect, disconnect or emit on the same signal;
//! slots connected mid-emit are first offered the next payload.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::callback::CallbackId;
use super::slot::{Slot, SlotSpec};
use crate::error::Result;

/// Unique identifier for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
    /// Generate a new unique signal ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

/// A sequence counter shared between signals.
///
/// Clones draw from the same counter.
#[derive(Debug, Clone, Default)]
pub struct OrderAssigner {
    last: Arc<AtomicU64>,
}

impl OrderAssigner {
    /// Create an assigner whose first number is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next sequence number, starting at 1.
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The last number handed out, 0 if none.
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }

    /// Restart numbering so the next number is 1 again.
    ///
    /// Resetting a signal or bus does not touch a shared assigner; the owner
    /// resets it alongside them when replaying a run.
    pub fn reset(&self) {
        self.last.store(0, Ordering::Relaxed);
    }
}

type AssignFn = Arc<dyn Fn() -> u64 + Send + Sync>;

struct SignalState<T> {
    /// Last locally assigned sequence number.
    sequence: u64,
    slots: BTreeMap<u64, Slot<T>>,
    by_callback: HashMap<CallbackId, u64>,
}

impl<T> SignalState<T> {
    fn detach(&mut self, callback: CallbackId) -> Option<Slot<T>> {
        let order = self.by_callback.remove(&callback)?;
        self.slots.remove(&order)
    }
}

/// An ordered broadcast channel for payloads of type `T`.
///
/// Signals are handles: clones share the same slots.
///
/// # Example
///
/// ```rust
/// use rxbus_core::signal::{Signal, SlotSpec};
///
/// let damage: Signal<i32> = Signal::named("damage");
/// damage.connect(SlotSpec::new(|amount: &mut i32| *amount -= 2)).unwrap();
/// damage.connect(SlotSpec::new(|amount: &mut i32| *amount *= 2)).unwrap();
///
/// let mut amount = 10;
/// damage.emit(&mut amount);
/// assert_eq!(amount, 16);
/// ```
pub struct Signal<T> {
    id: SignalId,
    name: Arc<str>,
    assigner: Option<AssignFn>,
    state: Arc<RwLock<SignalState<T>>>,
}

impl<T> Signal<T> {
    /// Create an unnamed signal numbering its own slots.
    pub fn new() -> Self {
        Self::named("")
    }

    /// Create a named signal numbering its own slots.
    pub fn named(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    /// Create a signal drawing sequence numbers from `assigner`.
    ///
    /// The assigner must return strictly increasing numbers.
    pub fn with_assigner<F>(name: impl Into<String>, assigner: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        Self::build(name.into(), Some(Arc::new(assigner)))
    }

    /// Create a signal sharing `order` with other signals.
    pub fn with_order(name: impl Into<String>, order: &OrderAssigner) -> Self {
        let order = order.clone();
        Self::with_assigner(name, move || order.next())
    }

    fn build(name: String, assigner: Option<AssignFn>) -> Self {
        Self {
            id: SignalId::new(),
            name: name.into(),
            assigner,
            state: Arc::new(RwLock::new(SignalState {
                sequence: 0,
                slots: BTreeMap::new(),
                by_callback: HashMap::new(),
            })),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn next_order(&self) -> u64 {
        match &self.assigner {
            Some(assign) => assign(),
            None => {
                let mut state = self.state.write();
                state.sequence += 1;
                state.sequence
            }
        }
    }

    /// Build a slot from `spec` and connect it.
    ///
    /// A slot already connected under the same callback is disconnected
    /// first.
    pub fn connect(&self, spec: SlotSpec<T>) -> Result<Slot<T>> {
        let slot = Slot::new(spec)?;
        Ok(self.connect_slot(slot))
    }

    /// Connect a prebuilt slot under a fresh sequence number.
    pub fn connect_slot(&self, slot: Slot<T>) -> Slot<T> {
        self.disconnect(slot.callback_id());

        let order = self.next_order();
        let mut state = self.state.write();
        state.by_callback.insert(slot.callback_id(), order);
        state.slots.insert(order, slot.clone());

        slot
    }

    /// Remove and deactivate the slot connected under `callback`.
    ///
    /// Returns `None` if nothing was connected under it.
    pub fn disconnect(&self, callback: CallbackId) -> Option<Slot<T>> {
        let slot = self.state.write().detach(callback)?;
        slot.deactivate();
        Some(slot)
    }

    /// Offer `payload` to every connected slot in sequence order.
    ///
    /// Returns how many slots delivered.
    pub fn emit(&self, payload: &mut T) -> usize {
        let slots = self.slots();
        tracing::trace!(
            signal = self.id.raw(),
            name = %self.name,
            slots = slots.len(),
            "emit"
        );

        let mut delivered = 0;
        for slot in &slots {
            if slot.dispatch(payload) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Age every connected slot by one time step.
    pub fn tick(&self) {
        for slot in self.slots() {
            slot.tick();
        }
    }

    /// Forget every inactive slot. Finalizers are not run again.
    ///
    /// Returns how many slots were removed.
    pub fn sweep(&self) -> usize {
        let mut state = self.state.write();
        let dead: Vec<u64> = state
            .slots
            .iter()
            .filter(|(_, slot)| !slot.is_active())
            .map(|(order, _)| *order)
            .collect();

        for order in &dead {
            if let Some(slot) = state.slots.remove(order) {
                if state.by_callback.get(&slot.callback_id()) == Some(order) {
                    state.by_callback.remove(&slot.callback_id());
                }
            }
        }
        dead.len()
    }

    /// Drop every slot and restart local numbering from zero.
    ///
    /// Dropped slots are not deactivated. A shared [`OrderAssigner`] keeps
    /// counting; call [`OrderAssigner::reset`] as well for a full restart.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.sequence = 0;
        state.slots.clear();
        state.by_callback.clear();
    }

    /// Connected slots in sequence order.
    pub fn slots(&self) -> Vec<Slot<T>> {
        self.state.read().slots.values().cloned().collect()
    }

    /// Sequence numbers of connected slots, ascending.
    pub fn orders(&self) -> Vec<u64> {
        self.state.read().slots.keys().copied().collect()
    }

    /// Sequence number of the slot connected under `callback`.
    pub fn order_of(&self, callback: CallbackId) -> Option<u64> {
        self.state.read().by_callback.get(&callback).copied()
    }

    pub fn len(&self) -> usize {
        self.state.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().slots.is_empty()
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: Arc::clone(&self.name),
            assigner: self.assigner.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> fmt::Display for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "signal:{}", self.id.0)
        } else {
            f.write_str(&self.name)
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("slot_count", &self.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
