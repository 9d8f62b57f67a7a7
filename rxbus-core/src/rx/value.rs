//! Reactive Values
//!
//! A `ReactiveValue` keeps one scalar per entity and lets any number of
//! independent modifiers shape it. Modifiers are slots on a private signal;
//! `request` folds the entity's baseline through every matching, live
//! modifier in sequence order.
//!
//! # Retention
//!
//! - **Persistent**: the fold result becomes the new baseline. Effects
//!   compound, and a modifier that later dies leaves its past contribution
//!   in place. Suited to damage and healing.
//! - **Ephemeral**: the fold result is only cached for `observe`. Every
//!   request starts again from the registered baseline, so a modifier stops
//!   mattering the moment it dies. Suited to temporary buffs.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::RxContext;
use crate::config::{Retention, SlotOptions};
use crate::error::{Error, Result};
use crate::signal::{Callback, CallbackId, Check, Dependencies, Signal, SignalBus, Slot, SlotSpec};

/// A slot that modifies a reactive value.
pub type Modifier<K, V> = Slot<RxContext<K, V>>;

/// Blueprint for a [`Modifier`].
///
/// Unlike a plain [`SlotSpec`], a modifier applies once unless told
/// otherwise: it starts from [`SlotOptions::modifier`].
pub struct ModifierSpec<K, V> {
    spec: SlotSpec<RxContext<K, V>>,
}

impl<K, V> ModifierSpec<K, V> {
    /// Start a single-use modifier.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&mut RxContext<K, V>) + Send + Sync + 'static,
    {
        Self::from_callback(Callback::new(callback))
    }

    /// Build from an existing callback, keeping its identity.
    pub fn from_callback(callback: Callback<RxContext<K, V>>) -> Self {
        Self {
            spec: SlotSpec::from_callback(callback).options(SlotOptions::modifier()),
        }
    }

    /// Only apply to folds the predicate accepts.
    pub fn check<F>(self, check: F) -> Self
    where
        F: Fn(&RxContext<K, V>) -> bool + Send + Sync + 'static,
    {
        self.map(|spec| spec.check(check))
    }

    /// Share an existing predicate.
    pub fn check_with(self, check: Check<RxContext<K, V>>) -> Self {
        self.map(|spec| spec.check_with(check))
    }

    /// Run `finalizer` once, when the modifier deactivates.
    pub fn finally<F>(self, finalizer: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.map(|spec| spec.finally(finalizer))
    }

    /// Replace every counter at once.
    pub fn options(self, options: SlotOptions) -> Self {
        self.map(|spec| spec.options(options))
    }

    /// Expire after this many ticks.
    pub fn duration(self, duration: i64) -> Self {
        self.map(|spec| spec.duration(duration))
    }

    /// Expire after this many applications. Pass -1 for a standing modifier.
    pub fn invocations(self, invocations: i64) -> Self {
        self.map(|spec| spec.invocations(invocations))
    }

    /// Hold off applying and aging for this many ticks.
    pub fn duration_delay(self, delay: i64) -> Self {
        self.map(|spec| spec.duration_delay(delay))
    }

    /// Skip this many matching folds before applying.
    pub fn invocation_delay(self, delay: i64) -> Self {
        self.map(|spec| spec.invocation_delay(delay))
    }

    /// Identity of the callback this modifier will connect.
    pub fn callback_id(&self) -> CallbackId {
        self.spec.callback_id()
    }

    /// The underlying slot spec, for building a [`Modifier`] by hand.
    pub fn into_slot_spec(self) -> SlotSpec<RxContext<K, V>> {
        self.spec
    }

    fn map(self, f: impl FnOnce(SlotSpec<RxContext<K, V>>) -> SlotSpec<RxContext<K, V>>) -> Self {
        Self { spec: f(self.spec) }
    }
}

impl<K, V> Debug for ModifierSpec<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModifierSpec").field(&self.spec).finish()
    }
}

struct Values<K, V> {
    baseline: HashMap<K, V>,
    /// Last fold result per key. Ephemeral values only.
    observed: HashMap<K, V>,
}

/// Per-entity value shaped by modifiers.
///
/// Handles are cheap to clone; clones share values and modifiers, so a
/// modifier on one value can read another.
///
/// # Example
///
/// ```rust
/// use rxbus_core::rx::{modifiers, ReactiveValue};
/// use rxbus_core::signal::SignalBus;
///
/// let bus = SignalBus::new();
/// let attack = ReactiveValue::ephemeral(&bus);
/// attack.register("hero", 10);
///
/// attack.add_modifier(modifiers::offset_once("hero", 5)).unwrap();
/// assert_eq!(attack.request(&"hero").unwrap(), 15);
/// assert_eq!(attack.request(&"hero").unwrap(), 10);
/// ```
pub struct ReactiveValue<K, V> {
    retention: Retention,
    bus: SignalBus,
    signal: Signal<RxContext<K, V>>,
    values: Arc<RwLock<Values<K, V>>>,
}

impl<K, V> ReactiveValue<K, V>
where
    K: Eq + Hash + Clone + Debug + 'static,
    V: Clone + 'static,
{
    /// Create a value whose private signal lives on `bus`.
    pub fn new(bus: &SignalBus, retention: Retention) -> Self {
        Self::named(bus, retention, "")
    }

    /// Create a value with a named private signal, for logs.
    pub fn named(bus: &SignalBus, retention: Retention, name: impl Into<String>) -> Self {
        let signal = Signal::named(name);
        bus.register(&signal);

        Self {
            retention,
            bus: bus.clone(),
            signal,
            values: Arc::new(RwLock::new(Values {
                baseline: HashMap::new(),
                observed: HashMap::new(),
            })),
        }
    }

    /// Create a value whose folds compound into the baseline.
    pub fn persistent(bus: &SignalBus) -> Self {
        Self::new(bus, Retention::Persistent)
    }

    /// Create a value whose folds always restart from the baseline.
    pub fn ephemeral(bus: &SignalBus) -> Self {
        Self::new(bus, Retention::Ephemeral)
    }

    /// Whether fold results are committed.
    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// The private signal modifiers are connected to.
    pub fn signal(&self) -> &Signal<RxContext<K, V>> {
        &self.signal
    }

    /// Set the baseline for `key`, replacing any earlier one.
    pub fn register(&self, key: K, initial: V) -> &Self {
        let mut values = self.values.write();
        if self.retention == Retention::Ephemeral {
            values.observed.insert(key.clone(), initial.clone());
        }
        values.baseline.insert(key, initial);
        self
    }

    /// Whether `key` has a baseline.
    pub fn contains(&self, key: &K) -> bool {
        self.values.read().baseline.contains_key(key)
    }

    /// Registered keys, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.values.read().baseline.keys().cloned().collect()
    }

    /// Connect a modifier. Keep the returned slot to cancel it early.
    pub fn add_modifier(&self, spec: ModifierSpec<K, V>) -> Result<Modifier<K, V>> {
        self.add_modifier_with(spec, Dependencies::none())
    }

    /// Connect a modifier gated on other signals.
    pub fn add_modifier_with(
        &self,
        spec: ModifierSpec<K, V>,
        deps: Dependencies,
    ) -> Result<Modifier<K, V>> {
        self.bus.connect(&self.signal, spec.into_slot_spec(), deps)
    }

    /// Connect a prebuilt modifier slot.
    pub fn add_slot(&self, slot: Modifier<K, V>, deps: Dependencies) -> Result<Modifier<K, V>> {
        self.bus.connect_slot(&self.signal, slot, deps)
    }

    fn baseline(&self, key: &K) -> Result<V> {
        self.values
            .read()
            .baseline
            .get(key)
            .cloned()
            .ok_or_else(|| Error::unknown_key(key))
    }

    /// Fold the baseline of `key` through every matching modifier.
    ///
    /// Persistent values commit the result as the new baseline; ephemeral
    /// values only cache it for [`observe`](Self::observe).
    pub fn request(&self, key: &K) -> Result<V> {
        let mut context = RxContext::new(self.baseline(key)?, key.clone());
        self.bus.emit(&self.signal, &mut context);
        let result = context.into_current();

        let mut values = self.values.write();
        let store = match self.retention {
            Retention::Persistent => &mut values.baseline,
            Retention::Ephemeral => &mut values.observed,
        };
        store.insert(key.clone(), result.clone());

        Ok(result)
    }

    /// The last computed value for `key`, without recomputing.
    pub fn observe(&self, key: &K) -> Result<V> {
        let values = self.values.read();
        let store = match self.retention {
            Retention::Persistent => &values.baseline,
            Retention::Ephemeral => &values.observed,
        };
        store.get(key).cloned().ok_or_else(|| Error::unknown_key(key))
    }

    /// Overwrite the baseline of `key`, bypassing every modifier.
    pub fn direct_modify(&self, key: &K, value: V) -> Result<()> {
        let mut values = self.values.write();
        let Some(baseline) = values.baseline.get_mut(key) else {
            return Err(Error::unknown_key(key));
        };
        *baseline = value.clone();

        if self.retention == Retention::Ephemeral {
            values.observed.insert(key.clone(), value);
        }
        Ok(())
    }
}

impl<K, V> Clone for ReactiveValue<K, V> {
    fn clone(&self) -> Self {
        Self {
            retention: self.retention,
            bus: self.bus.clone(),
            signal: self.signal.clone(),
            values: Arc::clone(&self.values),
        }
    }
}

impl<K, V> Debug for ReactiveValue<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveValue")
            .field("retention", &self.retention)
            .field("signal", &self.signal)
            .field("keys", &self.values.read().baseline.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
