//! End-to-end scenarios exercising machines and coordinators together.

use harel::builder::{goto_emitting, StateSpec, TableBuilder};
use harel::{
    event_id, state_id, Clock, Guard, Machine, MachineOptions, ManualClock, RegionCoordinator,
    RegionSpec, SyncStatus, TransitionCause, TransitionTable,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn machine<S, C, E>(table: TransitionTable<S, C, E>, context: C) -> Machine<S, C, E>
where
    S: harel::StateId,
    C: Clone + Send + 'static,
    E: harel::EventId,
{
    Machine::new(
        Arc::new(table),
        context,
        Arc::new(ManualClock::new()),
        MachineOptions::default(),
    )
    .unwrap()
}

mod counter {
    use super::*;

    state_id! {
        enum S { Root, Idle, MaxReached }
    }

    event_id! {
        enum E { Increment, MaxReached }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Ctx {
        value: u32,
    }

    #[test]
    fn ten_increments_bubble_a_synthetic_max_event() {
        let table = TableBuilder::new()
            .state(StateSpec::compound(S::Root, S::Idle).on(E::MaxReached, S::MaxReached))
            .state(StateSpec::atomic(S::Idle).child_of(S::Root).on_spec(
                E::Increment,
                goto_emitting(S::Idle, |c: Ctx, emitter| {
                    let value = c.value + 1;
                    if value >= 10 {
                        emitter.emit(E::MaxReached);
                    }
                    Ctx { value }
                }),
            ))
            .state(StateSpec::atomic(S::MaxReached).child_of(S::Root))
            .build()
            .unwrap();
        let machine = machine(table, Ctx { value: 0 });

        for _ in 0..10 {
            machine.send(E::Increment).unwrap();
        }

        assert_eq!(machine.context(), Ctx { value: 10 });
        assert_eq!(machine.current_state(), S::MaxReached);
    }

    #[test]
    fn guarded_immediate_transient_settles_at_the_bound() {
        let table = TableBuilder::new()
            .state(StateSpec::compound(S::Root, S::Idle).on(E::MaxReached, S::MaxReached))
            .state(StateSpec::atomic(S::Idle).child_of(S::Root).transient(
                harel::TransientSpec {
                    delay: harel::TransientDelay::Immediate,
                    target: S::Idle,
                    guard: Some(Guard::new(|c: &Ctx| c.value < 10)),
                    action: Some(harel::Action::with_emitter(|c: Ctx, emitter| {
                        let value = c.value + 1;
                        if value >= 10 {
                            emitter.emit(E::MaxReached);
                        }
                        Ctx { value }
                    })),
                },
            ))
            .state(StateSpec::atomic(S::MaxReached).child_of(S::Root))
            .build()
            .unwrap();

        // Settling happens during construction: the transient re-enters
        // Idle until the guard fails, then the emitted event bubbles.
        let machine = machine(table, Ctx { value: 0 });

        assert_eq!(machine.context(), Ctx { value: 10 });
        assert_eq!(machine.current_state(), S::MaxReached);
    }
}

mod regions {
    use super::*;

    state_id! {
        enum S { Top, Idle, Running, Patrol, Chase, Paused, Done }
    }

    event_id! {
        enum E { Start, Engage, Pause, Finish }
    }

    fn player_table() -> Arc<TransitionTable<S, (), E>> {
        Arc::new(
            TableBuilder::new()
                .state(StateSpec::compound(S::Top, S::Idle))
                .state(StateSpec::atomic(S::Idle).child_of(S::Top).on(E::Start, S::Running))
                .state(
                    StateSpec::atomic(S::Running)
                        .child_of(S::Top)
                        .on(E::Pause, S::Paused)
                        .on(E::Finish, S::Done),
                )
                .state(StateSpec::atomic(S::Paused).child_of(S::Top))
                .state(StateSpec::atomic(S::Done).child_of(S::Top))
                .build()
                .unwrap(),
        )
    }

    fn enemy_table() -> Arc<TransitionTable<S, (), E>> {
        // The enemy declares no Pause transition at all.
        Arc::new(
            TableBuilder::new()
                .state(StateSpec::compound(S::Top, S::Patrol))
                .state(
                    StateSpec::atomic(S::Patrol)
                        .child_of(S::Top)
                        .on(E::Engage, S::Chase),
                )
                .state(
                    StateSpec::atomic(S::Chase)
                        .child_of(S::Top)
                        .on(E::Finish, S::Done),
                )
                .state(StateSpec::atomic(S::Done).child_of(S::Top))
                .build()
                .unwrap(),
        )
    }

    fn coordinator() -> RegionCoordinator<S, (), E> {
        let coordinator = RegionCoordinator::new(Arc::new(ManualClock::new()) as Arc<dyn Clock>);
        coordinator
            .fork(vec![
                RegionSpec::new("player", player_table(), ()),
                RegionSpec::new("enemy", enemy_table(), ()),
            ])
            .unwrap();
        coordinator
    }

    #[test]
    fn broadcast_resolves_independently_per_region() {
        let coordinator = coordinator();
        coordinator.send_to_region("player", E::Start).unwrap();
        coordinator.send_to_region("enemy", E::Engage).unwrap();
        assert!(coordinator
            .are_regions_in_states(&[("player", S::Running), ("enemy", S::Chase)]));

        // Only the player declares Pause; the enemy ignoring it is
        // normal, not an error.
        coordinator.broadcast(E::Pause).unwrap();

        assert!(!coordinator.are_regions_in_states(&[("player", S::Running)]));
        assert!(coordinator
            .are_regions_in_states(&[("player", S::Paused), ("enemy", S::Chase)]));
    }

    #[test]
    fn join_waits_for_agreement_then_disposes() {
        let coordinator = coordinator();
        coordinator.send_to_region("player", E::Start).unwrap();
        coordinator.send_to_region("enemy", E::Engage).unwrap();

        let handle = coordinator.join(
            &["player", "enemy"],
            &[("player", S::Done), ("enemy", S::Done)],
            Some(Duration::from_secs(60)),
        );

        coordinator.send_to_region("player", E::Finish).unwrap();
        assert_eq!(handle.status(), SyncStatus::Pending);

        coordinator.send_to_region("enemy", E::Finish).unwrap();
        assert!(handle.is_resolved());
        assert!(matches!(
            coordinator.send_to_region("player", E::Start),
            Err(harel::CoordinatorError::RegionDisposed(_))
        ));
    }

    #[test]
    fn wait_for_sync_resolves_exactly_once() {
        let coordinator = coordinator();
        let settles = Arc::new(AtomicUsize::new(0));

        let handle = coordinator.wait_for_sync(&[("player", S::Running)], None);
        let counter = Arc::clone(&settles);
        handle.on_settle(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        coordinator.send_to_region("player", E::Start).unwrap();
        // Further matching changes must not settle it again.
        coordinator.send_to_region("enemy", E::Engage).unwrap();
        coordinator.send_to_region("player", E::Pause).unwrap();
        coordinator.send_to_region("player", E::Start).unwrap_or(());

        assert_eq!(settles.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_sync_ignores_true_to_true_changes() {
        let coordinator = coordinator();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        coordinator.on_sync("player-running", &[("player", S::Running)], move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        coordinator.send_to_region("player", E::Start).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Unrelated region activity while the condition stays true.
        coordinator.send_to_region("enemy", E::Engage).unwrap();
        coordinator.send_to_region("enemy", E::Finish).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

mod hierarchy {
    use super::*;

    state_id! {
        enum S {
            Root,
            Off,
            On,
            Par,
            Motor,
            MotorIdle,
            MotorSpinning,
            Lamp,
            LampDim,
            LampBright,
        }
    }

    event_id! {
        enum E { Power, Spin, Brighten, Bogus }
    }

    fn table() -> TransitionTable<S, (), E> {
        TableBuilder::new()
            .state(StateSpec::compound(S::Root, S::Off))
            .state(StateSpec::atomic(S::Off).child_of(S::Root).on(E::Power, S::On))
            .state(
                StateSpec::compound(S::On, S::Par)
                    .child_of(S::Root)
                    .on(E::Power, S::Off),
            )
            .state(StateSpec::parallel(S::Par).child_of(S::On))
            .state(StateSpec::compound(S::Motor, S::MotorIdle).child_of(S::Par))
            .state(
                StateSpec::atomic(S::MotorIdle)
                    .child_of(S::Motor)
                    .on(E::Spin, S::MotorSpinning),
            )
            .state(StateSpec::atomic(S::MotorSpinning).child_of(S::Motor))
            .state(StateSpec::compound(S::Lamp, S::LampDim).child_of(S::Par))
            .state(
                StateSpec::atomic(S::LampDim)
                    .child_of(S::Lamp)
                    .on(E::Brighten, S::LampBright),
            )
            .state(StateSpec::atomic(S::LampBright).child_of(S::Lamp))
            .build()
            .unwrap()
    }

    #[test]
    fn entering_a_parallel_state_activates_every_region() {
        let machine = machine(table(), ());

        machine.send(E::Power).unwrap();

        assert_eq!(
            machine.active_leaves(),
            vec![S::MotorIdle, S::LampDim]
        );
        assert!(machine.is_in(S::On));
        assert!(machine.is_in(S::Par));
        assert!(machine.is_in(S::Motor));
        assert!(machine.is_in(S::Lamp));
    }

    #[test]
    fn regions_advance_independently() {
        let machine = machine(table(), ());
        machine.send(E::Power).unwrap();

        machine.send(E::Spin).unwrap();
        assert_eq!(
            machine.active_leaves(),
            vec![S::MotorSpinning, S::LampDim]
        );

        machine.send(E::Brighten).unwrap();
        assert_eq!(
            machine.active_leaves(),
            vec![S::MotorSpinning, S::LampBright]
        );
    }

    #[test]
    fn leaving_the_parallel_ancestor_collapses_all_regions() {
        let machine = machine(table(), ());
        machine.send(E::Power).unwrap();
        machine.send(E::Spin).unwrap();

        // Power bubbles from both leaves to On.
        machine.send(E::Power).unwrap();

        assert_eq!(machine.active_leaves(), vec![S::Off]);
        assert!(!machine.is_in(S::Par));
    }

    #[test]
    fn unmatched_event_changes_nothing() {
        let machine = machine(table(), ());
        machine.send(E::Power).unwrap();
        let before = machine.active_leaves();
        let history_len = machine.history().len();

        machine.send(E::Bogus).unwrap();

        assert_eq!(machine.active_leaves(), before);
        assert_eq!(machine.history().len(), history_len);
    }

    #[test]
    fn force_state_round_trips_through_current_state() {
        let machine = machine(table(), ());

        machine.force_state(S::LampBright, "test jump").unwrap();

        assert_eq!(machine.current_state(), S::LampBright);
        assert!(machine.is_in(S::On));
        assert_eq!(
            machine.history().last().unwrap().cause,
            TransitionCause::Forced("test jump".to_string())
        );
    }

    #[test]
    fn history_counts_only_committed_transitions() {
        let machine = machine(table(), ());

        machine.send(E::Power).unwrap();
        machine.send(E::Bogus).unwrap();
        machine.send(E::Spin).unwrap();
        machine.send(E::Power).unwrap();

        // Power into the parallel state, Spin, Power back out. The
        // no-op event appends nothing.
        assert_eq!(machine.history().len(), 3);
    }
}
