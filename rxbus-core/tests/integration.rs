//! Integration Tests for the Dispatch Engine
//!
//! These tests drive signals, the bus, and reactive values together through
//! the public API.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use rxbus_core::rx::modifiers::{offset_for, offset_once};
use rxbus_core::signal::{Callback, OrderAssigner, PauseReason};
use rxbus_core::{
    Dependencies, Error, ModifierHandles, ReactiveValue, Retention, Signal, SignalBus, SlotOptions,
    SlotSpec,
};

fn counter() -> Arc<AtomicI32> {
    Arc::new(AtomicI32::new(0))
}

fn bump(count: &Arc<AtomicI32>) -> impl Fn(&mut ()) + Send + Sync + 'static {
    let count = Arc::clone(count);
    move |_: &mut ()| {
        count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Slots fire in connect order even when another signal shares the order.
#[test]
fn ordering_survives_interleaved_connects() {
    let order = OrderAssigner::new();
    let left: Signal<Vec<&'static str>> = Signal::with_order("left", &order);
    let right: Signal<Vec<&'static str>> = Signal::with_order("right", &order);

    for (signal, tag) in [
        (&left, "l1"),
        (&right, "r1"),
        (&left, "l2"),
        (&right, "r2"),
        (&left, "l3"),
    ] {
        signal
            .connect(SlotSpec::new(move |seen: &mut Vec<&'static str>| {
                seen.push(tag)
            }))
            .unwrap();
    }

    let mut seen = Vec::new();
    left.emit(&mut seen);
    assert_eq!(seen, vec!["l1", "l2", "l3"]);
    assert_eq!(left.orders(), vec![1, 3, 5]);
    assert_eq!(right.orders(), vec![2, 4]);
}

/// The finalizer runs once no matter how many triggers try to end a slot.
#[test]
fn final_runs_exactly_once_across_triggers() {
    let bus = SignalBus::new();
    let hit: Signal<()> = Signal::new();
    let wave_over: Signal<()> = Signal::new();
    bus.register(&hit);
    bus.register(&wave_over);

    let calls = counter();
    let finals = counter();
    let finals_probe = Arc::clone(&finals);

    let slot = bus
        .connect(
            &hit,
            SlotSpec::new(bump(&calls))
                .invocations(1)
                .duration(1)
                .finally(move || {
                    finals_probe.fetch_add(1, Ordering::SeqCst);
                }),
            Dependencies::none().end_on(&wave_over),
        )
        .unwrap();

    bus.emit(&hit, &mut ());
    bus.tick();
    bus.emit(&wave_over, &mut ());
    assert!(!slot.deactivate());

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(finals.load(Ordering::SeqCst), 1);
}

#[test]
fn ephemeral_buff_vanishes_after_use() {
    let bus = SignalBus::new();
    let attack = ReactiveValue::ephemeral(&bus);
    attack.register("hero", 10);

    attack.add_modifier(offset_once("hero", 5)).unwrap();

    assert_eq!(attack.request(&"hero").unwrap(), 15);
    for _ in 0..3 {
        assert_eq!(attack.request(&"hero").unwrap(), 10);
    }
}

#[test]
fn persistent_damage_compounds() {
    let bus = SignalBus::new();
    let hp = ReactiveValue::persistent(&bus);
    hp.register("hero", 10);

    hp.add_modifier(offset_once("hero", 5)).unwrap();
    assert_eq!(hp.request(&"hero").unwrap(), 15);

    hp.add_modifier(offset_once("hero", 3)).unwrap();
    assert_eq!(hp.request(&"hero").unwrap(), 18);

    for _ in 0..3 {
        assert_eq!(hp.request(&"hero").unwrap(), 18);
    }
}

#[test]
fn start_dependency_gates_until_first_emit() {
    let bus = SignalBus::new();
    let strike: Signal<()> = Signal::named("strike");
    let dawn: Signal<()> = Signal::named("dawn");
    bus.register(&strike);
    bus.register(&dawn);

    let calls = counter();
    let slot = bus
        .connect(
            &strike,
            SlotSpec::new(bump(&calls)),
            Dependencies::none().start_after(&dawn),
        )
        .unwrap();

    assert_eq!(bus.pending_start(dawn.id()), 1);
    assert!(slot.has_pause(PauseReason::CrossSignal).unwrap());

    bus.emit(&strike, &mut ());
    bus.emit(&strike, &mut ());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    bus.emit(&dawn, &mut ());
    assert_eq!(bus.pending_start(dawn.id()), 0);
    assert!(!slot.is_paused());

    bus.emit(&strike, &mut ());
    bus.emit(&dawn, &mut ());
    bus.emit(&strike, &mut ());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn end_dependency_kills_live_slot() {
    let bus = SignalBus::new();
    let strike: Signal<()> = Signal::new();
    let dusk: Signal<()> = Signal::new();
    bus.register(&strike);
    bus.register(&dusk);

    let calls = counter();
    let finals = counter();
    let finals_probe = Arc::clone(&finals);

    let slot = bus
        .connect(
            &strike,
            SlotSpec::new(bump(&calls))
                .invocations(5)
                .finally(move || {
                    finals_probe.fetch_add(1, Ordering::SeqCst);
                }),
            Dependencies::none().end_on(&dusk),
        )
        .unwrap();

    bus.emit(&strike, &mut ());
    bus.emit(&dusk, &mut ());
    bus.emit(&strike, &mut ());
    bus.emit(&dusk, &mut ());

    assert!(!slot.is_active());
    assert_eq!(slot.remaining_invocations(), 4);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(finals.load(Ordering::SeqCst), 1);
}

#[test]
fn invocation_delay_skips_first_matches() {
    let signal: Signal<()> = Signal::new();
    let calls = counter();

    let slot = signal
        .connect(
            SlotSpec::new(bump(&calls))
                .invocations(1)
                .invocation_delay(2),
        )
        .unwrap();

    assert_eq!(signal.emit(&mut ()), 0);
    assert_eq!(signal.emit(&mut ()), 0);
    assert!(slot.is_active());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_eq!(signal.emit(&mut ()), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!slot.is_active());
}

#[test]
fn reconnect_gets_later_order() {
    let signal: Signal<()> = Signal::new();
    let calls = counter();
    let callback = Callback::new(bump(&calls));

    let first = signal
        .connect(SlotSpec::from_callback(callback.clone()))
        .unwrap();
    let first_order = signal.order_of(callback.id()).unwrap();

    let removed = signal.disconnect(callback.id()).unwrap();
    assert!(!removed.is_active());

    let second = signal.connect(SlotSpec::from_callback(callback.clone())).unwrap();
    let second_order = signal.order_of(callback.id()).unwrap();

    assert!(second_order > first_order);
    assert!(!first.is_active());
    assert!(second.is_active());

    signal.emit(&mut ());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn unregistered_signals_are_rejected() {
    let bus = SignalBus::new();
    let known: Signal<()> = Signal::named("known");
    let stranger: Signal<()> = Signal::named("stranger");
    bus.register(&known);

    let err = bus
        .connect(&stranger, SlotSpec::new(|_: &mut ()| {}), Dependencies::none())
        .unwrap_err();
    assert!(matches!(err, Error::SignalNotRegistered { .. }));
    assert!(err.is_configuration());

    let err = bus
        .connect(
            &known,
            SlotSpec::new(|_: &mut ()| {}),
            Dependencies::none().end_on(&stranger),
        )
        .unwrap_err();
    assert!(matches!(err, Error::SignalNotRegistered { .. }));
    assert!(known.is_empty());
}

#[test]
fn options_load_from_json() {
    let options = SlotOptions::from_json(r#"{ "invocations": 2, "duration_delay": 1 }"#).unwrap();
    let signal: Signal<()> = Signal::new();
    let calls = counter();

    let slot = signal
        .connect(SlotSpec::new(bump(&calls)).options(options))
        .unwrap();
    assert_eq!(slot.remaining_duration(), -1);
    assert!(slot.is_delayed());

    signal.tick();
    for _ in 0..3 {
        signal.emit(&mut ());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!slot.is_active());

    assert!(matches!(
        SlotOptions::from_json(r#"{ "duration": -4 }"#),
        Err(Error::InvalidCounter { field: "duration", value: -4 })
    ));
}

#[test]
fn paused_slot_neither_fires_nor_ages() {
    let bus = SignalBus::new();
    let signal: Signal<()> = Signal::new();
    bus.register(&signal);

    let calls = counter();
    let slot = bus
        .connect(
            &signal,
            SlotSpec::new(bump(&calls)).duration(1),
            Dependencies::none(),
        )
        .unwrap();

    slot.pause(PauseReason::Generic).unwrap();
    bus.emit(&signal, &mut ());
    bus.end_turn();
    assert!(slot.is_active());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    slot.resume(PauseReason::Generic).unwrap();
    bus.emit(&signal, &mut ());
    assert_eq!(bus.end_turn(), 1);
    assert!(!slot.is_active());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn callbacks_can_emit_other_signals() {
    let bus = SignalBus::new();
    let outer: Signal<i32> = Signal::named("outer");
    let inner: Signal<i32> = Signal::named("inner");
    bus.register(&outer);
    bus.register(&inner);

    inner
        .connect(SlotSpec::new(|value: &mut i32| *value += 100))
        .unwrap();

    let relay_bus = bus.clone();
    let relay_inner = inner.clone();
    outer
        .connect(SlotSpec::new(move |value: &mut i32| {
            relay_bus.emit(&relay_inner, value);
        }))
        .unwrap();
    outer
        .connect(SlotSpec::new(|value: &mut i32| *value *= 2))
        .unwrap();

    let mut value = 1;
    assert_eq!(bus.emit(&outer, &mut value), 2);
    assert_eq!(value, 202);
}

/// A few turns of a skirmish: a poison ticking on turn end, a timed attack
/// buff, and the poison being reapplied mid-fight.
#[test]
fn multi_turn_skirmish() {
    let bus = SignalBus::new();
    let turn_end: Signal<u32> = Signal::named("turn_end");
    bus.register(&turn_end);

    let hp = ReactiveValue::named(&bus, Retention::Persistent, "hp");
    let attack = ReactiveValue::named(&bus, Retention::Ephemeral, "attack");
    hp.register("hero", 20).register("villain", 20);
    attack.register("hero", 10);

    let poisons = ModifierHandles::new();
    let cured = Arc::new(Mutex::new(Vec::new()));

    let apply_poison = |target: &'static str, damage: i32, turns: i64| {
        let hp = hp.clone();
        let cured = Arc::clone(&cured);
        let slot = bus
            .connect(
                &turn_end,
                SlotSpec::new(move |_: &mut u32| {
                    hp.add_modifier(offset_once(target, -damage)).unwrap();
                    hp.request(&target).unwrap();
                })
                .duration(turns)
                .finally(move || cured.lock().unwrap().push(target)),
                Dependencies::none(),
            )
            .unwrap();
        poisons.replace(target, slot.handle());
    };

    apply_poison("villain", 3, 2);
    attack.add_modifier(offset_for("hero", 5, 0, 2)).unwrap();

    let mut turn = 1;
    assert_eq!(attack.request(&"hero").unwrap(), 15);
    bus.emit(&turn_end, &mut turn);
    assert_eq!(hp.observe(&"villain").unwrap(), 17);
    bus.end_turn();

    turn += 1;
    apply_poison("villain", 4, 2);
    assert_eq!(cured.lock().unwrap().len(), 1);
    assert_eq!(attack.request(&"hero").unwrap(), 15);
    bus.emit(&turn_end, &mut turn);
    assert_eq!(hp.observe(&"villain").unwrap(), 13);
    bus.end_turn();

    turn += 1;
    assert_eq!(attack.request(&"hero").unwrap(), 10);
    bus.emit(&turn_end, &mut turn);
    assert_eq!(hp.observe(&"villain").unwrap(), 9);
    bus.end_turn();

    turn += 1;
    bus.emit(&turn_end, &mut turn);
    assert_eq!(hp.observe(&"villain").unwrap(), 9);
    assert_eq!(hp.observe(&"hero").unwrap(), 20);
    assert_eq!(*cured.lock().unwrap(), vec!["villain", "villain"]);

    assert_eq!(poisons.sweep(), 1);
    assert!(poisons.is_empty());
    assert!(turn_end.is_empty());
}

#[test]
fn reset_restarts_sequence_numbers() {
    let bus = SignalBus::new();
    let signal: Signal<()> = Signal::new();
    bus.register(&signal);

    let dusk: Signal<()> = Signal::new();
    bus.register(&dusk);

    bus.connect(
        &signal,
        SlotSpec::new(|_: &mut ()| {}),
        Dependencies::none().end_on(&dusk),
    )
    .unwrap();
    bus.connect(&signal, SlotSpec::new(|_: &mut ()| {}), Dependencies::none())
        .unwrap();
    assert_eq!(signal.orders(), vec![1, 2]);

    bus.reset();
    assert!(signal.is_empty());
    assert_eq!(bus.pending_end(dusk.id()), 0);

    bus.connect(&signal, SlotSpec::new(|_: &mut ()| {}), Dependencies::none())
        .unwrap();
    assert_eq!(signal.orders(), vec![1]);
}
