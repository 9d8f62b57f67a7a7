//! Rxbus Core
//!
//! This crate provides a synchronous publish/subscribe dispatch engine and
//! the reactive values built on top of it. It implements:
//!
//! - Signals: typed broadcast channels with ordered subscribers
//! - Slots: subscriptions with checks, finalizers, lifetimes and delays
//! - A bus that ticks signals and gates slots on other signals
//! - Reactive values folded through modifiers on request
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `signal`: Slots, signals, and the signal bus
//! - `rx`: Reactive values and stock modifiers
//! - `config`: Slot lifetime options
//! - `error`: The crate error type
//!
//! # Example
//!
//! ```rust
//! use rxbus_core::{Dependencies, Signal, SignalBus, SlotSpec};
//!
//! let bus = SignalBus::new();
//! let turn_end: Signal<u32> = Signal::named("turn_end");
//! let attack: Signal<i32> = Signal::named("attack");
//! bus.register(&turn_end);
//! bus.register(&attack);
//!
//! // Double the next attack, but only once the turn has ended.
//! let slot = bus
//!     .connect(
//!         &attack,
//!         SlotSpec::new(|damage: &mut i32| *damage *= 2).invocations(1),
//!         Dependencies::none().start_after(&turn_end),
//!     )
//!     .unwrap();
//!
//! let mut damage = 5;
//! bus.emit(&attack, &mut damage);
//! assert_eq!(damage, 5);
//!
//! bus.emit(&turn_end, &mut 1);
//! bus.emit(&attack, &mut damage);
//! assert_eq!(damage, 10);
//! assert!(!slot.is_active());
//! ```

pub mod config;
pub mod error;
pub mod rx;
pub mod signal;

pub use config::{Retention, SlotOptions, UNLIMITED};
pub use error::{Error, Result};
pub use rx::{ModifierHandles, ReactiveValue, RxContext};
pub use signal::{Dependencies, Signal, SignalBus, Slot, SlotHandle, SlotSpec};
