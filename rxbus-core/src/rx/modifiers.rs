//! Stock modifiers.
//!
//! Builders for the modifier shapes most values need. Each returns a
//! [`ModifierSpec`] that can be tuned further before it is connected.

use std::ops::Add;
use std::sync::Arc;

use super::context::RxContext;
use super::value::ModifierSpec;
use crate::config::UNLIMITED;
use crate::signal::Check;

/// A modifier that fires once, on any key.
pub fn modifier<K, V, F>(f: F) -> ModifierSpec<K, V>
where
    F: Fn(&mut RxContext<K, V>) + Send + Sync + 'static,
{
    ModifierSpec::new(f)
}

/// Check that matches folds for `key` only.
pub fn targets<K, V>(key: K) -> Check<RxContext<K, V>>
where
    K: PartialEq + Send + Sync + 'static,
{
    Arc::new(move |context: &RxContext<K, V>| *context.target() == key)
}

/// Add `delta` to the next fold for `key`.
pub fn offset_once<K, V>(key: K, delta: V) -> ModifierSpec<K, V>
where
    K: PartialEq + Send + Sync + 'static,
    V: Add<Output = V> + Clone + Send + Sync + 'static,
{
    modifier(move |context: &mut RxContext<K, V>| {
        let next = context.current().clone() + delta.clone();
        context.append(next);
    })
    .check_with(targets(key))
}

/// Replace the next fold result for `key` with `value`.
pub fn set_once<K, V>(key: K, value: V) -> ModifierSpec<K, V>
where
    K: PartialEq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    modifier(move |context: &mut RxContext<K, V>| context.append(value.clone()))
        .check_with(targets(key))
}

/// Add `delta` to every fold for `key` over the next `turns` ticks, never
/// going below `floor`.
///
/// Pair with an ephemeral value so the bonus vanishes when the slot
/// expires.
pub fn offset_for<K, V>(key: K, delta: V, floor: V, turns: i64) -> ModifierSpec<K, V>
where
    K: PartialEq + Send + Sync + 'static,
    V: Add<Output = V> + PartialOrd + Clone + Send + Sync + 'static,
{
    ModifierSpec::new(move |context: &mut RxContext<K, V>| {
        let next = context.current().clone() + delta.clone();
        let next = if next < floor { floor.clone() } else { next };
        context.append(next);
    })
    .check_with(targets(key))
    .invocations(UNLIMITED)
    .duration(turns)
}
