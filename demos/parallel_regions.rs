//! Parallel Regions and Coordination
//!
//! This example demonstrates a media player whose playback and audio
//! controls evolve concurrently inside one machine, plus a coordinator
//! synchronizing two independent download machines.
//!
//! Key concepts:
//! - Parallel states: one active leaf per region
//! - Event bubbling across regions
//! - fork / wait_for_sync / join across machines
//!
//! Run with: cargo run --example parallel_regions

use harel::builder::{StateSpec, TableBuilder};
use harel::{
    event_id, state_id, Clock, Machine, MachineOptions, ManualClock, RegionCoordinator,
    RegionSpec, StateId, TransitionTable,
};
use std::sync::Arc;
use std::time::Duration;

state_id! {
    enum Player {
        Top,
        Controls,
        Playback,
        Stopped,
        Playing,
        Audio,
        Unmuted,
        Muted,
    }
}

event_id! {
    enum PlayerEv {
        PlayPause,
        ToggleMute,
    }
}

fn player_demo() {
    println!("--- Parallel playback and audio regions ---\n");

    let table = TableBuilder::new()
        .state(StateSpec::compound(Player::Top, Player::Controls))
        .state(StateSpec::parallel(Player::Controls).child_of(Player::Top))
        .state(StateSpec::compound(Player::Playback, Player::Stopped).child_of(Player::Controls))
        .state(
            StateSpec::atomic(Player::Stopped)
                .child_of(Player::Playback)
                .on(PlayerEv::PlayPause, Player::Playing),
        )
        .state(
            StateSpec::atomic(Player::Playing)
                .child_of(Player::Playback)
                .on(PlayerEv::PlayPause, Player::Stopped),
        )
        .state(StateSpec::compound(Player::Audio, Player::Unmuted).child_of(Player::Controls))
        .state(
            StateSpec::atomic(Player::Unmuted)
                .child_of(Player::Audio)
                .on(PlayerEv::ToggleMute, Player::Muted),
        )
        .state(
            StateSpec::atomic(Player::Muted)
                .child_of(Player::Audio)
                .on(PlayerEv::ToggleMute, Player::Unmuted),
        )
        .build()
        .unwrap();

    let machine = Machine::new(
        Arc::new(table),
        (),
        Arc::new(ManualClock::new()),
        MachineOptions::default(),
    )
    .unwrap();

    let show = |label: &str, machine: &Machine<Player, (), PlayerEv>| {
        let active = machine.active_leaves();
        let leaves: Vec<&str> = active.iter().map(|s| s.name()).collect();
        println!("  {:<18} active leaves: {:?}", label, leaves);
    };

    show("initial:", &machine);
    machine.send(PlayerEv::PlayPause).unwrap();
    show("after play:", &machine);
    machine.send(PlayerEv::ToggleMute).unwrap();
    show("after mute:", &machine);
    machine.send(PlayerEv::PlayPause).unwrap();
    show("after pause:", &machine);
}

state_id! {
    enum Download {
        Job,
        Queued,
        Fetching,
        Complete,
    }
}

event_id! {
    enum DownloadEv {
        Dispatch,
        Finished,
    }
}

fn download_table() -> Arc<TransitionTable<Download, (), DownloadEv>> {
    Arc::new(
        TableBuilder::new()
            .state(StateSpec::compound(Download::Job, Download::Queued))
            .state(
                StateSpec::atomic(Download::Queued)
                    .child_of(Download::Job)
                    .on(DownloadEv::Dispatch, Download::Fetching),
            )
            .state(
                StateSpec::atomic(Download::Fetching)
                    .child_of(Download::Job)
                    .on(DownloadEv::Finished, Download::Complete),
            )
            .state(StateSpec::atomic(Download::Complete).child_of(Download::Job))
            .build()
            .unwrap(),
    )
}

fn coordinator_demo() {
    println!("\n--- Fork, sync, and join across machines ---\n");

    let clock = Arc::new(ManualClock::new());
    let coordinator = RegionCoordinator::new(Arc::clone(&clock) as Arc<dyn Clock>);

    coordinator
        .fork(vec![
            RegionSpec::new("primary", download_table(), ()),
            RegionSpec::new("mirror", download_table(), ()),
        ])
        .unwrap();
    println!("  forked regions: {:?}", coordinator.active_regions());

    coordinator.on_sync(
        "all-fetching",
        &[
            ("primary", Download::Fetching),
            ("mirror", Download::Fetching),
        ],
        || println!("  sync: both downloads are fetching"),
    );

    let joined = coordinator.join(
        &["primary", "mirror"],
        &[
            ("primary", Download::Complete),
            ("mirror", Download::Complete),
        ],
        Some(Duration::from_secs(60)),
    );
    joined.on_settle(|outcome| match outcome {
        Ok(()) => println!("  join: both downloads complete, regions disposed"),
        Err(error) => println!("  join failed: {error}"),
    });

    coordinator.broadcast(DownloadEv::Dispatch).unwrap();
    coordinator
        .send_to_region("primary", DownloadEv::Finished)
        .unwrap();
    println!(
        "  primary done, mirror still {:?}",
        coordinator.region_state("mirror")
    );
    coordinator
        .send_to_region("mirror", DownloadEv::Finished)
        .unwrap();

    println!("  active regions after join: {:?}", coordinator.active_regions());
}

fn main() {
    println!("=== Parallel Regions and Coordination ===\n");

    player_demo();
    coordinator_demo();

    println!("\n=== Example Complete ===");
}
