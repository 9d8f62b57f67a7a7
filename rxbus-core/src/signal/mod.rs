//! Signals and Slots
//!
//! This module implements the dispatch engine: typed broadcast channels
//! (signals), subscriptions with their own lifecycles (slots), and the bus
//! that links them.
//!
//! # Concepts
//!
//! ## Slots
//!
//! A slot wraps a callback with an optional check, an optional finalizer and
//! lifetime counters. It can be paused (stops delivery and counting) or
//! delayed (stops delivery while its delay counters run down). Once a slot
//! deactivates it stays dead, and its finalizer has run exactly once.
//!
//! ## Signals
//!
//! A signal keeps its slots in sequence order and offers every emitted
//! payload to them in that order. Callbacks get the payload mutably, so a
//! signal can thread a running value through its slots.
//!
//! ## The Bus
//!
//! The bus owns signals, ticks them once per turn, and gates slots on the
//! emissions of other signals (start and end dependencies).
//!
//! # Implementation Notes
//!
//! Dispatch is synchronous and single-threaded in spirit. Shared state sits
//! behind `parking_lot` locks only so handles can be cloned into callbacks;
//! no lock is held while user code runs, which keeps reentrant emits and
//! self-cancelling slots safe.

mod bus;
mod callback;
mod channel;
mod lock;
mod slot;

pub use bus::{Dependencies, DynSignal, SignalBus};
pub use callback::{Callback, CallbackId, Check, Finalizer};
pub use channel::{OrderAssigner, Signal, SignalId};
pub use lock::{DelayReason, LockReason, MultiLock, PauseReason};
pub use slot::{Slot, SlotHandle, SlotId, SlotSpec};
