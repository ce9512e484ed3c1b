//! Traffic Light Statechart
//!
//! This example demonstrates delayed transient transitions driven by a
//! virtual clock.
//!
//! Key concepts:
//! - Cyclic state transitions (states repeat)
//! - Delayed transients: each phase times out into the next
//! - Deterministic timing via ManualClock
//! - Transition history as an audit trail
//!
//! Run with: cargo run --example traffic_light

use harel::builder::{StateSpec, TableBuilder};
use harel::{event_id, state_id, Machine, MachineOptions, ManualClock, StateId};
use std::sync::Arc;
use std::time::Duration;

state_id! {
    enum Light {
        Intersection,
        Red,
        Green,
        Yellow,
    }
}

event_id! {
    enum Ev {
        EmergencyStop,
    }
}

fn main() {
    println!("=== Traffic Light Statechart ===\n");

    let table = TableBuilder::new()
        .state(StateSpec::compound(Light::Intersection, Light::Red).on(Ev::EmergencyStop, Light::Red))
        .state(
            StateSpec::atomic(Light::Red)
                .child_of(Light::Intersection)
                .transient_after(Duration::from_secs(30), Light::Green),
        )
        .state(
            StateSpec::atomic(Light::Green)
                .child_of(Light::Intersection)
                .transient_after(Duration::from_secs(25), Light::Yellow),
        )
        .state(
            StateSpec::atomic(Light::Yellow)
                .child_of(Light::Intersection)
                .transient_after(Duration::from_secs(5), Light::Red),
        )
        .build()
        .unwrap();

    let clock = Arc::new(ManualClock::new());
    let machine = Machine::new(
        Arc::new(table),
        (),
        Arc::clone(&clock) as Arc<dyn harel::Clock>,
        MachineOptions::default(),
    )
    .unwrap();

    println!("Initial state: {:?}", machine.current_state());

    println!("\nAdvancing virtual time through one full cycle:");
    for (label, seconds) in [("30s", 30u64), ("25s", 25), ("5s", 5)] {
        clock.advance(Duration::from_secs(seconds));
        println!("  after {:>3}: {:?}", label, machine.current_state());
    }

    println!("\nEmergency stop from mid-cycle:");
    clock.advance(Duration::from_secs(30));
    println!("  currently: {:?}", machine.current_state());
    machine.send(Ev::EmergencyStop).unwrap();
    println!("  after stop: {:?}", machine.current_state());

    println!("\nTransition history:");
    for record in machine.history().records() {
        println!(
            "  {:>8} -> {:<8} ({:?})",
            record.from.name(),
            record.to.name(),
            record.cause
        );
    }

    println!("\n=== Example Complete ===");
}
