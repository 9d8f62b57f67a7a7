//! Reactive Values
//!
//! Values that are computed on request by folding a baseline through a
//! chain of modifiers. Each `ReactiveValue` owns a private signal on a
//! shared bus; modifiers are ordinary slots on it, so they get every slot
//! feature for free: checks, lifetimes, delays, and cross-signal
//! dependencies.
//!
//! # How a Request Works
//!
//! 1. The baseline for the key seeds a fresh [`RxContext`].
//! 2. The context is emitted on the value's signal. Each matching modifier
//!    reads `current()` and appends its result.
//! 3. The last value is the answer. Persistent values store it as the new
//!    baseline; ephemeral values only cache it.

mod context;
mod handles;
pub mod modifiers;
mod value;

pub use context::RxContext;
pub use handles::ModifierHandles;
pub use value::{Modifier, ModifierSpec, ReactiveValue};
