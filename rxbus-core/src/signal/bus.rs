//! Signal Bus
//!
//! The bus is the coordinator that owns a set of signals and links slots
//! across them. It adds two things plain signals cannot do:
//!
//! 1. **Dependencies.** A slot connected with a start dependency is born
//!    paused and resumes the first time the dependency signal is emitted.
//!    A slot connected with an end dependency is deactivated the first time
//!    its dependency signal is emitted.
//!
//! 2. **Time.** `tick` ages every slot on every registered signal by one
//!    step. The owning simulation calls it once per turn boundary.
//!
//! # Dependency Resolution
//!
//! When a signal is emitted through the bus, every dependency keyed on that
//! signal is resolved before the payload reaches any slot. Each dependency
//! entry is consumed exactly once, even if all of its slots are already
//! dead. Resolution never fails.
//!
//! The bus is a handle; clones share the same state. Create one per
//! simulation instance and pass it to whatever needs it.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::callback::CallbackId;
use super::channel::{Signal, SignalId};
use super::lock::PauseReason;
use super::slot::{Slot, SlotHandle, SlotSpec};
use crate::error::{Error, Result};

/// Type-erased view of a signal, used by the bus to drive time and cleanup.
pub trait DynSignal: Send + Sync {
    /// The signal's unique ID.
    fn signal_id(&self) -> SignalId;

    /// Human-readable label for logs and errors.
    fn label(&self) -> String;

    /// Age every slot by one step.
    fn tick_slots(&self);

    /// Forget inactive slots, returning how many were removed.
    fn sweep_slots(&self) -> usize;

    /// Drop every slot and restart numbering.
    fn reset_slots(&self);
}

impl<T: 'static> DynSignal for Signal<T> {
    fn signal_id(&self) -> SignalId {
        self.id()
    }

    fn label(&self) -> String {
        self.to_string()
    }

    fn tick_slots(&self) {
        self.tick();
    }

    fn sweep_slots(&self) -> usize {
        self.sweep()
    }

    fn reset_slots(&self) {
        self.reset();
    }
}

/// Cross-signal gating for a slot connected through the bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dependencies {
    start: Option<SignalId>,
    end: Option<SignalId>,
}

impl Dependencies {
    /// No gating.
    pub fn none() -> Self {
        Self::default()
    }

    /// Stay paused until `signal` is first emitted.
    pub fn start_after<U>(mut self, signal: &Signal<U>) -> Self {
        self.start = Some(signal.id());
        self
    }

    /// Deactivate when `signal` is first emitted.
    pub fn end_on<U>(mut self, signal: &Signal<U>) -> Self {
        self.end = Some(signal.id());
        self
    }

    pub fn start(&self) -> Option<SignalId> {
        self.start
    }

    pub fn end(&self) -> Option<SignalId> {
        self.end
    }
}

type Pending = SmallVec<[SlotHandle; 4]>;

#[derive(Default)]
struct BusState {
    signals: IndexMap<SignalId, Arc<dyn DynSignal>>,
    start_dep: IndexMap<SignalId, Pending>,
    end_dep: IndexMap<SignalId, Pending>,
}

impl BusState {
    fn ensure_registered(&self, id: SignalId, label: impl FnOnce() -> String) -> Result<()> {
        if self.signals.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::not_registered(label()))
        }
    }
}

/// Prune dead slots from each pending set and drop sets left empty.
fn retain_live(pending: &mut IndexMap<SignalId, Pending>) {
    pending.retain(|_, slots| {
        slots.retain(|slot| slot.is_active());
        !slots.is_empty()
    });
}

/// Owner of a set of signals and the dependencies between them.
#[derive(Clone, Default)]
pub struct SignalBus {
    state: Arc<Mutex<BusState>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signal. Registering twice is a no-op.
    ///
    /// Returns true if the signal was newly registered.
    pub fn register<T: 'static>(&self, signal: &Signal<T>) -> bool {
        let mut state = self.state.lock();
        if state.signals.contains_key(&signal.id()) {
            return false;
        }
        state.signals.insert(signal.id(), Arc::new(signal.clone()));
        true
    }

    pub fn is_registered(&self, id: SignalId) -> bool {
        self.state.lock().signals.contains_key(&id)
    }

    /// Number of registered signals.
    pub fn signal_count(&self) -> usize {
        self.state.lock().signals.len()
    }

    /// Build a slot on `signal` and install its dependencies.
    ///
    /// Fails if `signal` or either dependency is not registered here.
    pub fn connect<T: 'static>(
        &self,
        signal: &Signal<T>,
        spec: SlotSpec<T>,
        deps: Dependencies,
    ) -> Result<Slot<T>> {
        self.check_wiring(signal, deps)?;
        let slot = Slot::new(spec)?;
        self.install(signal, slot, deps)
    }

    /// Connect a prebuilt slot on `signal` and install its dependencies.
    pub fn connect_slot<T: 'static>(
        &self,
        signal: &Signal<T>,
        slot: Slot<T>,
        deps: Dependencies,
    ) -> Result<Slot<T>> {
        self.check_wiring(signal, deps)?;
        self.install(signal, slot, deps)
    }

    /// Connect `slot` and record its dependencies. Wiring is already checked.
    fn install<T>(&self, signal: &Signal<T>, slot: Slot<T>, deps: Dependencies) -> Result<Slot<T>> {
        let slot = signal.connect_slot(slot);

        if let Some(start) = deps.start {
            slot.pause(PauseReason::CrossSignal)?;
            self.state
                .lock()
                .start_dep
                .entry(start)
                .or_default()
                .push(slot.handle());
        }
        if let Some(end) = deps.end {
            self.state
                .lock()
                .end_dep
                .entry(end)
                .or_default()
                .push(slot.handle());
        }

        if deps != Dependencies::none() {
            tracing::debug!(
                signal = %signal,
                slot = slot.id().raw(),
                start = deps.start.map(|id| id.raw()),
                end = deps.end.map(|id| id.raw()),
                "connected dependent slot"
            );
        }
        Ok(slot)
    }

    fn check_wiring<T>(&self, signal: &Signal<T>, deps: Dependencies) -> Result<()> {
        let state = self.state.lock();
        state.ensure_registered(signal.id(), || signal.to_string())?;
        for dep in [deps.start, deps.end].into_iter().flatten() {
            state.ensure_registered(dep, || format!("signal:{}", dep.raw()))?;
        }
        Ok(())
    }

    /// Remove and deactivate the slot connected under `callback`.
    pub fn disconnect<T>(&self, signal: &Signal<T>, callback: CallbackId) -> Option<Slot<T>> {
        signal.disconnect(callback)
    }

    /// Resolve dependencies keyed on `signal`, then emit `payload` on it.
    ///
    /// Returns how many slots delivered.
    pub fn emit<T>(&self, signal: &Signal<T>, payload: &mut T) -> usize {
        let (starts, ends) = {
            let mut state = self.state.lock();
            (
                state.start_dep.shift_remove(&signal.id()),
                state.end_dep.shift_remove(&signal.id()),
            )
        };

        if starts.is_some() || ends.is_some() {
            tracing::debug!(
                signal = %signal,
                resumed = starts.as_ref().map_or(0, |slots| slots.len()),
                ended = ends.as_ref().map_or(0, |slots| slots.len()),
                "resolving dependencies"
            );
        }

        for slot in starts.into_iter().flatten() {
            if let Err(err) = slot.resume(PauseReason::CrossSignal) {
                tracing::warn!(%err, slot = slot.id().raw(), "failed to resume slot");
            }
        }
        for slot in ends.into_iter().flatten() {
            slot.deactivate_with("end dependency fired");
        }

        signal.emit(payload)
    }

    fn signals(&self) -> Vec<Arc<dyn DynSignal>> {
        self.state.lock().signals.values().cloned().collect()
    }

    /// Age every slot on every registered signal by one step.
    pub fn tick(&self) {
        for signal in self.signals() {
            signal.tick_slots();
        }
    }

    /// Forget inactive slots everywhere and drop dependency entries that
    /// no longer hold a live slot.
    ///
    /// Returns how many slots were removed from signals.
    pub fn sweep(&self) -> usize {
        let removed: usize = self
            .signals()
            .iter()
            .map(|signal| signal.sweep_slots())
            .sum();

        let mut state = self.state.lock();
        retain_live(&mut state.start_dep);
        retain_live(&mut state.end_dep);

        tracing::debug!(removed, "swept bus");
        removed
    }

    /// Close a turn: age everything, then reclaim dead slots.
    pub fn end_turn(&self) -> usize {
        self.tick();
        self.sweep()
    }

    /// Reset every signal and forget every dependency.
    ///
    /// Shared [`OrderAssigner`](super::OrderAssigner)s are owned by the
    /// caller and must be reset separately.
    pub fn reset(&self) {
        for signal in self.signals() {
            signal.reset_slots();
        }

        let mut state = self.state.lock();
        state.start_dep.clear();
        state.end_dep.clear();
        tracing::debug!(signals = state.signals.len(), "reset bus");
    }

    /// Slots waiting for `signal` before they start.
    pub fn pending_start(&self, signal: SignalId) -> usize {
        self.state.lock().start_dep.get(&signal).map_or(0, |slots| slots.len())
    }

    /// Slots that end when `signal` fires.
    pub fn pending_end(&self, signal: SignalId) -> usize {
        self.state.lock().end_dep.get(&signal).map_or(0, |slots| slots.len())
    }
}

impl fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let signals: Vec<String> = state.signals.values().map(|signal| signal.label()).collect();
        f.debug_struct("SignalBus")
            .field("signals", &signals)
            .field("start_dep", &state.start_dep.len())
            .field("end_dep", &state.end_dep.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
