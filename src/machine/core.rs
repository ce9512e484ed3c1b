//! The machine engine: run-to-completion event processing over a shared
//! transition table.
//!
//! A [`Machine`] pairs an immutable [`TransitionTable`] with mutable
//! runtime state (active configuration, context, history, queue) behind a
//! cheap-to-clone handle. All processing is run-to-completion: `send`
//! drains the queue fully, including events emitted by actions, before
//! returning. Transitions are staged on a cloned context and committed
//! atomically, so a failing hook or action leaves state and context
//! exactly as they were.
//!
//! Subscriber notifications are staged during the drain and dispatched
//! only after the machine's lock is released, so observers always see the
//! settled machine and may re-enter the API from their callbacks.

use crate::clock::{lock, Clock};
use crate::core::{Emitter, EventId, StateId, TransitionCause, TransitionHistory, TransitionRecord};
use crate::machine::cell::{Notification, StateCell, Subscription};
use crate::machine::error::MachineError;
use crate::machine::queue::{EventQueue, Queued};
use crate::machine::resolver::{self, Resolution};
use crate::machine::transient::TransientTimers;
use crate::table::{TransientDelay, TransitionSpec, TransitionTable};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Tunables applied at machine construction.
#[derive(Clone, Debug)]
pub struct MachineOptions {
    /// Return [`MachineError::UnknownEvent`] when no active state declares
    /// a sent event. When false such events are silently ignored.
    pub strict_events: bool,
    /// Append a [`TransitionCause::Ignored`] history record for events
    /// that matched nothing (non-strict mode only).
    pub record_ignored: bool,
    /// Bound the transition history to this many records, evicting the
    /// oldest. `None` keeps everything.
    pub history_retention: Option<usize>,
    /// Maximum immediate-transient firings per settling pass before the
    /// engine reports a [`MachineError::TransientLoop`].
    pub transient_chain_limit: usize,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            strict_events: false,
            record_ignored: false,
            history_retention: None,
            transient_chain_limit: 1000,
        }
    }
}

type SubscriberFn<S, E> = Arc<dyn Fn(&Notification<S, E>) + Send + Sync>;

struct Inner<S: StateId, C, E: EventId> {
    /// Active configuration: one root-to-leaf path per concurrent region.
    config: Vec<Vec<S>>,
    context: C,
    history: TransitionHistory<S, E>,
    queue: EventQueue<S, E>,
    timers: TransientTimers<S>,
    disposed: bool,
    /// Error raised by a timer-driven drain, surfaced on the next call.
    deferred: Option<MachineError>,
    options: MachineOptions,
}

struct MachineShared<S: StateId, C, E: EventId> {
    table: Arc<TransitionTable<S, C, E>>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner<S, C, E>>,
    subscribers: Mutex<Vec<(u64, SubscriberFn<S, E>)>>,
    next_subscriber: AtomicU64,
}

impl<S: StateId, C, E: EventId> MachineShared<S, C, E> {
    fn dispatch(&self, staged: &[Notification<S, E>]) {
        if staged.is_empty() {
            return;
        }
        let subscribers: Vec<SubscriberFn<S, E>> = lock(&self.subscribers)
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect();
        for notification in staged {
            for subscriber in &subscribers {
                subscriber(notification);
            }
        }
    }
}

/// A running statechart instance.
///
/// Handles are cheap to clone and share one underlying machine. All
/// operations are safe to call from multiple threads; processing is
/// serialized internally.
///
/// # Example
///
/// ```rust
/// use harel::builder::{StateSpec, TableBuilder};
/// use harel::{event_id, state_id, Machine, MachineOptions, ManualClock};
/// use std::sync::Arc;
///
/// state_id! {
///     enum Light { Top, Red, Green }
/// }
/// event_id! {
///     enum Tick { Next }
/// }
///
/// let table = TableBuilder::new()
///     .state(StateSpec::compound(Light::Top, Light::Red))
///     .state(StateSpec::atomic(Light::Red).child_of(Light::Top).on(Tick::Next, Light::Green))
///     .state(StateSpec::atomic(Light::Green).child_of(Light::Top).on(Tick::Next, Light::Red))
///     .build()
///     .unwrap();
///
/// let machine = Machine::new(
///     Arc::new(table),
///     (),
///     Arc::new(ManualClock::new()),
///     MachineOptions::default(),
/// )
/// .unwrap();
///
/// assert_eq!(machine.current_state(), Light::Red);
/// machine.send(Tick::Next).unwrap();
/// assert_eq!(machine.current_state(), Light::Green);
/// ```
pub struct Machine<S: StateId, C, E: EventId> {
    shared: Arc<MachineShared<S, C, E>>,
}

impl<S: StateId, C, E: EventId> Clone for Machine<S, C, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S, C, E> Machine<S, C, E>
where
    S: StateId,
    C: Clone + Send + 'static,
    E: EventId,
{
    /// Construct a machine and enter the root state.
    ///
    /// Entry hooks run for the root and every auto-descended initial
    /// child, and any immediate transients settle before this returns.
    /// The initial entry appends no history record.
    pub fn new(
        table: Arc<TransitionTable<S, C, E>>,
        context: C,
        clock: Arc<dyn Clock>,
        options: MachineOptions,
    ) -> Result<Self, MachineError> {
        let (entered, paths) = resolver::initial_configuration(&table);

        let mut context = context;
        for &state in &entered {
            if let Some(hook) = &table.node(state).on_entry {
                context = hook.run(context).map_err(|source| MachineError::Action {
                    from: table.root().name().to_string(),
                    source,
                })?;
            }
        }

        let history = match options.history_retention {
            Some(retention) => TransitionHistory::bounded(retention),
            None => TransitionHistory::new(),
        };
        let shared = Arc::new(MachineShared {
            table,
            clock,
            inner: Mutex::new(Inner {
                config: paths,
                context,
                history,
                queue: EventQueue::new(),
                timers: TransientTimers::new(),
                disposed: false,
                deferred: None,
                options,
            }),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber: AtomicU64::new(0),
        });

        {
            let mut inner = lock(&shared.inner);
            Self::arm_delayed(&shared, &mut inner, &entered);
            let mut staged = Vec::new();
            Self::settle_transients(&shared, &mut inner, &mut staged)?;
            Self::drain(&shared, &mut inner, &mut staged)?;
        }

        Ok(Machine { shared })
    }

    /// Send an event and process it to completion.
    ///
    /// The event bubbles from each active leaf toward the root; the
    /// deepest declaring state with a passing guard wins. Events emitted
    /// by actions are processed before this returns. An error aborts only
    /// the offending transition; events still queued at that point are
    /// processed by the next call. A pending timer-driven error is
    /// surfaced first, with the event kept on the queue for that next
    /// call rather than dropped.
    pub fn send(&self, event: E) -> Result<(), MachineError> {
        let mut staged = Vec::new();
        let result = {
            let mut inner = lock(&self.shared.inner);
            if inner.disposed {
                return Err(MachineError::Disposed);
            }
            inner.queue.push_back(Queued::External(event));
            if let Some(deferred) = inner.deferred.take() {
                return Err(deferred);
            }
            Self::drain(&self.shared, &mut inner, &mut staged)
        };
        self.shared.dispatch(&staged);
        result
    }

    /// Replace the context without changing state.
    ///
    /// Subscribers receive a [`Notification::ContextChanged`]. Transients
    /// are entry-triggered and are not re-evaluated here.
    pub fn update_context(&self, f: impl FnOnce(C) -> C) -> Result<(), MachineError> {
        {
            let mut inner = lock(&self.shared.inner);
            if inner.disposed {
                return Err(MachineError::Disposed);
            }
            if let Some(deferred) = inner.deferred.take() {
                return Err(deferred);
            }
            let context = inner.context.clone();
            inner.context = f(context);
        }
        self.shared.dispatch(&[Notification::ContextChanged]);
        Ok(())
    }

    /// Jump directly to `target`, bypassing event resolution.
    ///
    /// Exit and entry hooks still run and the transition is recorded with
    /// [`TransitionCause::Forced`] carrying `reason`. Immediate transients
    /// of the forced target settle before this returns.
    pub fn force_state(&self, target: S, reason: impl Into<String>) -> Result<(), MachineError> {
        let mut staged = Vec::new();
        let result = {
            let mut inner = lock(&self.shared.inner);
            if inner.disposed {
                return Err(MachineError::Disposed);
            }
            if let Some(deferred) = inner.deferred.take() {
                return Err(deferred);
            }
            if !self.shared.table.contains(target) {
                return Err(MachineError::UnknownState(target.name().to_string()));
            }
            let spec = TransitionSpec {
                target,
                guard: None,
                action: None,
            };
            Self::execute_transition(
                &self.shared,
                &mut inner,
                0,
                &spec,
                None,
                TransitionCause::Forced(reason.into()),
                &mut staged,
            )
            .and_then(|()| Self::settle_transients(&self.shared, &mut inner, &mut staged))
            .and_then(|()| Self::drain(&self.shared, &mut inner, &mut staged))
        };
        self.shared.dispatch(&staged);
        result
    }

    /// Tear the machine down: cancel timers, clear the queue, drop
    /// subscribers. Further mutations fail with
    /// [`MachineError::Disposed`]; reads keep working against the final
    /// state. Idempotent.
    pub fn dispose(&self) {
        let tokens = {
            let mut inner = lock(&self.shared.inner);
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.queue.clear();
            inner.timers.drain_all()
        };
        for token in &tokens {
            self.shared.clock.cancel(token);
        }
        lock(&self.shared.subscribers).clear();
    }

    /// True once [`Machine::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        lock(&self.shared.inner).disposed
    }

    /// The current leaf state. Under a parallel root this is the first
    /// declared region's leaf; use [`Machine::active_leaves`] for all of
    /// them.
    pub fn current_state(&self) -> S {
        let inner = lock(&self.shared.inner);
        inner
            .config
            .first()
            .and_then(|path| path.last())
            .copied()
            .unwrap_or_else(|| self.shared.table.root())
    }

    /// Every active leaf, one per concurrent region, in declaration
    /// order.
    pub fn active_leaves(&self) -> Vec<S> {
        lock(&self.shared.inner)
            .config
            .iter()
            .filter_map(|path| path.last().copied())
            .collect()
    }

    /// True if `state` is active, either as a leaf or as an ancestor of
    /// one.
    pub fn is_in(&self, state: S) -> bool {
        lock(&self.shared.inner)
            .config
            .iter()
            .any(|path| path.contains(&state))
    }

    /// A clone of the current context.
    pub fn context(&self) -> C {
        lock(&self.shared.inner).context.clone()
    }

    /// A snapshot of the transition history.
    pub fn history(&self) -> TransitionHistory<S, E> {
        lock(&self.shared.inner).history.clone()
    }

    /// Take a pending error raised by a timer-driven transition, if any.
    /// Such errors are otherwise surfaced by the next mutating call.
    pub fn take_error(&self) -> Option<MachineError> {
        lock(&self.shared.inner).deferred.take()
    }

    /// Subscribe to change notifications.
    ///
    /// Callbacks run after the machine has settled and its lock is
    /// released, so they may call back into the machine.
    pub fn subscribe(
        &self,
        callback: impl Fn(&Notification<S, E>) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed);
        lock(&self.shared.subscribers).push((id, Arc::new(callback)));
        let weak = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                lock(&shared.subscribers).retain(|(sub_id, _)| *sub_id != id);
            }
        })
    }

    /// A type-erased, subscribable view of the current leaf state.
    pub fn state_cell(&self) -> StateCell<S> {
        let getter = self.clone();
        let source = self.clone();
        StateCell::from_parts(
            Arc::new(move || getter.current_state()),
            Arc::new(move |callback: Box<dyn Fn(S) + Send + Sync>| {
                source.subscribe(move |notification| {
                    if let Notification::StateChanged(record) = notification {
                        callback(record.to);
                    }
                })
            }),
        )
    }

    fn drain(
        shared: &Arc<MachineShared<S, C, E>>,
        inner: &mut Inner<S, C, E>,
        staged: &mut Vec<Notification<S, E>>,
    ) -> Result<(), MachineError> {
        while let Some(item) = inner.queue.pop_front() {
            match item {
                Queued::External(event) => Self::dispatch_event(shared, inner, event, staged)?,
                Queued::TransientFired { state } => {
                    Self::fire_delayed(shared, inner, state, staged)?
                }
            }
            Self::settle_transients(shared, inner, staged)?;
        }
        Ok(())
    }

    fn dispatch_event(
        shared: &Arc<MachineShared<S, C, E>>,
        inner: &mut Inner<S, C, E>,
        event: E,
        staged: &mut Vec<Notification<S, E>>,
    ) -> Result<(), MachineError> {
        let snapshot = inner.config.clone();
        let mut matched = false;
        let mut declared = false;

        for path in &snapshot {
            // A transition taken for an earlier region may have replaced
            // this path; resolve only against paths still active.
            let Some(index) = inner.config.iter().position(|p| p == path) else {
                continue;
            };
            match resolver::resolve(&shared.table, path, event, &inner.context) {
                Resolution::Matched(spec) => {
                    matched = true;
                    Self::execute_transition(
                        shared,
                        inner,
                        index,
                        &spec,
                        Some(event),
                        TransitionCause::Event,
                        staged,
                    )?;
                }
                Resolution::Blocked => declared = true,
                Resolution::Undeclared => {}
            }
        }

        if !matched && !declared {
            let leaf = inner
                .config
                .first()
                .and_then(|path| path.last())
                .copied()
                .unwrap_or_else(|| shared.table.root());
            if inner.options.strict_events {
                return Err(MachineError::UnknownEvent {
                    state: leaf.name().to_string(),
                    event: event.name().to_string(),
                });
            }
            if inner.options.record_ignored {
                let timestamp = shared.clock.now();
                let since_previous = inner.history.last().and_then(|prev| {
                    timestamp.signed_duration_since(prev.timestamp).to_std().ok()
                });
                inner.history.push(TransitionRecord {
                    from: leaf,
                    to: leaf,
                    event: Some(event),
                    cause: TransitionCause::Ignored,
                    timestamp,
                    since_previous,
                });
            }
        }
        Ok(())
    }

    fn fire_delayed(
        shared: &Arc<MachineShared<S, C, E>>,
        inner: &mut Inner<S, C, E>,
        state: S,
        staged: &mut Vec<Notification<S, E>>,
    ) -> Result<(), MachineError> {
        // The state may have been exited between the timer firing and
        // this item reaching the front of the queue.
        let Some(index) = inner.config.iter().position(|path| path.contains(&state)) else {
            return Ok(());
        };
        let Some(transient) = shared.table.node(state).transient.clone() else {
            return Ok(());
        };
        if let Some(guard) = &transient.guard {
            if !guard.check(&inner.context) {
                return Ok(());
            }
        }
        let spec = TransitionSpec {
            target: transient.target,
            guard: None,
            action: transient.action,
        };
        Self::execute_transition(
            shared,
            inner,
            index,
            &spec,
            None,
            TransitionCause::Transient,
            staged,
        )
    }

    /// Fire due immediate transients until none remain, erroring out past
    /// the configured chain limit.
    fn settle_transients(
        shared: &Arc<MachineShared<S, C, E>>,
        inner: &mut Inner<S, C, E>,
        staged: &mut Vec<Notification<S, E>>,
    ) -> Result<(), MachineError> {
        let limit = inner.options.transient_chain_limit;
        let mut hops = 0usize;
        while let Some((index, state, spec)) = Self::find_immediate(shared, inner) {
            if hops >= limit {
                return Err(MachineError::TransientLoop {
                    state: state.name().to_string(),
                    limit,
                });
            }
            hops += 1;
            Self::execute_transition(
                shared,
                inner,
                index,
                &spec,
                None,
                TransitionCause::Transient,
                staged,
            )?;
        }
        Ok(())
    }

    /// First immediate transient whose guard passes, scanning active
    /// paths in region order and each path leaf-first.
    fn find_immediate(
        shared: &Arc<MachineShared<S, C, E>>,
        inner: &Inner<S, C, E>,
    ) -> Option<(usize, S, TransitionSpec<S, C, E>)> {
        for (index, path) in inner.config.iter().enumerate() {
            for &state in path.iter().rev() {
                let node = shared.table.node(state);
                if let Some(transient) = &node.transient {
                    if transient.delay != TransientDelay::Immediate {
                        continue;
                    }
                    let passes = transient
                        .guard
                        .as_ref()
                        .map_or(true, |g| g.check(&inner.context));
                    if passes {
                        return Some((
                            index,
                            state,
                            TransitionSpec {
                                target: transient.target,
                                guard: None,
                                action: transient.action.clone(),
                            },
                        ));
                    }
                }
            }
        }
        None
    }

    /// Run one transition atomically: stage exit hooks, the action, and
    /// entry hooks on a cloned context, then commit state, context,
    /// timers, emitted events, and the history record together. Any
    /// failure before the commit leaves the machine untouched.
    fn execute_transition(
        shared: &Arc<MachineShared<S, C, E>>,
        inner: &mut Inner<S, C, E>,
        source_index: usize,
        spec: &TransitionSpec<S, C, E>,
        event: Option<E>,
        cause: TransitionCause,
        staged: &mut Vec<Notification<S, E>>,
    ) -> Result<(), MachineError> {
        let source_path = inner.config[source_index].clone();
        let from = source_path
            .last()
            .copied()
            .unwrap_or_else(|| shared.table.root());

        let domain = resolver::domain_index(&shared.table, &source_path, spec.target);
        let (exited, replaced) = resolver::exit_set(&inner.config, &source_path, domain);
        let (entered, new_paths) = resolver::entry_set(&shared.table, domain, spec.target);

        let fail = |source| MachineError::Action {
            from: from.name().to_string(),
            source,
        };

        let mut context = inner.context.clone();
        for &state in &exited {
            if let Some(hook) = &shared.table.node(state).on_exit {
                context = hook.run(context).map_err(fail)?;
            }
        }
        let mut emitter = Emitter::new();
        if let Some(action) = &spec.action {
            context = action.run(context, &mut emitter).map_err(fail)?;
        }
        for &state in &entered {
            if let Some(hook) = &shared.table.node(state).on_entry {
                context = hook.run(context).map_err(fail)?;
            }
        }

        // Commit point: nothing past here can fail.
        inner.context = context;

        let replaced_set: HashSet<usize> = replaced.iter().copied().collect();
        let insert_at = replaced.first().copied().unwrap_or(0);
        let mut next_config = Vec::with_capacity(inner.config.len() + new_paths.len());
        for (index, path) in inner.config.iter().enumerate() {
            if index == insert_at {
                next_config.extend(new_paths.iter().cloned());
            }
            if !replaced_set.contains(&index) {
                next_config.push(path.clone());
            }
        }
        inner.config = next_config;

        for &state in &exited {
            if let Some(token) = inner.timers.disarm(state) {
                shared.clock.cancel(&token);
            }
        }
        for emitted in emitter.into_events() {
            inner.queue.push_back(Queued::External(emitted));
        }
        Self::arm_delayed(shared, inner, &entered);

        let to = new_paths
            .first()
            .and_then(|path| path.last())
            .copied()
            .unwrap_or(spec.target);
        let timestamp = shared.clock.now();
        let since_previous = inner
            .history
            .last()
            .and_then(|prev| timestamp.signed_duration_since(prev.timestamp).to_std().ok());
        let record = TransitionRecord {
            from,
            to,
            event,
            cause,
            timestamp,
            since_previous,
        };
        inner.history.push(record.clone());
        staged.push(Notification::StateChanged(record));
        Ok(())
    }

    /// Schedule timers for delayed transients on newly entered states.
    /// Completions carry a generation number so a timer outliving its
    /// arming is dropped instead of firing against a re-entered state.
    fn arm_delayed(
        shared: &Arc<MachineShared<S, C, E>>,
        inner: &mut Inner<S, C, E>,
        entered: &[S],
    ) {
        for &state in entered {
            let node = shared.table.node(state);
            let Some(transient) = &node.transient else {
                continue;
            };
            let TransientDelay::After(delay) = transient.delay else {
                continue;
            };
            let generation = inner.timers.next_generation();
            let weak: Weak<MachineShared<S, C, E>> = Arc::downgrade(shared);
            let token = shared.clock.schedule(
                delay,
                Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        Self::on_timer_fire(&shared, state, generation);
                    }
                }),
            );
            inner.timers.arm(state, token, generation);
        }
    }

    fn on_timer_fire(shared: &Arc<MachineShared<S, C, E>>, state: S, generation: u64) {
        let staged = {
            let mut inner = lock(&shared.inner);
            if inner.disposed || !inner.timers.matches(state, generation) {
                return;
            }
            inner.timers.disarm(state);
            inner.queue.push_front(Queued::TransientFired { state });
            let mut staged = Vec::new();
            if let Err(error) = Self::drain(shared, &mut inner, &mut staged) {
                inner.deferred = Some(error);
            }
            staged
        };
        shared.dispatch(&staged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{StateSpec, TableBuilder};
    use crate::clock::ManualClock;
    use crate::core::{Action, Guard, Hook};
    use crate::{event_id, state_id};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    state_id! {
        enum S {
            Root,
            Idle,
            Busy,
            Done,
            Orphan,
        }
    }

    event_id! {
        enum E {
            Start,
            Finish,
            Reset,
            Bogus,
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Ctx {
        count: u32,
        trace: Vec<String>,
    }

    impl Ctx {
        fn new() -> Self {
            Ctx {
                count: 0,
                trace: Vec::new(),
            }
        }

        fn mark(mut self, label: &str) -> Self {
            self.trace.push(label.to_string());
            self
        }
    }

    fn simple_table() -> Arc<TransitionTable<S, Ctx, E>> {
        Arc::new(
            TableBuilder::new()
                .state(StateSpec::compound(S::Root, S::Idle).on(E::Reset, S::Idle))
                .state(
                    StateSpec::atomic(S::Idle)
                        .child_of(S::Root)
                        .on_spec(
                            E::Start,
                            crate::builder::goto_with(S::Busy, |c: Ctx| Ctx {
                                count: c.count + 1,
                                ..c
                            }),
                        ),
                )
                .state(StateSpec::atomic(S::Busy).child_of(S::Root).on(E::Finish, S::Done))
                .state(StateSpec::atomic(S::Done).child_of(S::Root))
                .build()
                .unwrap(),
        )
    }

    fn machine(options: MachineOptions) -> Machine<S, Ctx, E> {
        Machine::new(
            simple_table(),
            Ctx::new(),
            Arc::new(ManualClock::new()),
            options,
        )
        .unwrap()
    }

    #[test]
    fn starts_in_the_initial_leaf_without_history() {
        let machine = machine(MachineOptions::default());

        assert_eq!(machine.current_state(), S::Idle);
        assert!(machine.is_in(S::Root));
        assert!(machine.history().is_empty());
    }

    #[test]
    fn send_transitions_and_records_history() {
        let machine = machine(MachineOptions::default());

        machine.send(E::Start).unwrap();

        assert_eq!(machine.current_state(), S::Busy);
        assert_eq!(machine.context().count, 1);
        let history = machine.history();
        let record = history.last().unwrap();
        assert_eq!(record.from, S::Idle);
        assert_eq!(record.to, S::Busy);
        assert_eq!(record.event, Some(E::Start));
        assert_eq!(record.cause, TransitionCause::Event);
    }

    #[test]
    fn event_bubbles_to_ancestor_handler() {
        let machine = machine(MachineOptions::default());
        machine.send(E::Start).unwrap();

        // Busy does not declare Reset; Root does.
        machine.send(E::Reset).unwrap();

        assert_eq!(machine.current_state(), S::Idle);
    }

    #[test]
    fn unknown_event_is_ignored_by_default() {
        let machine = machine(MachineOptions::default());

        machine.send(E::Bogus).unwrap();

        assert_eq!(machine.current_state(), S::Idle);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn strict_mode_rejects_unknown_events() {
        let machine = machine(MachineOptions {
            strict_events: true,
            ..MachineOptions::default()
        });

        let err = machine.send(E::Bogus).unwrap_err();

        assert!(matches!(err, MachineError::UnknownEvent { .. }));
        assert_eq!(machine.current_state(), S::Idle);
    }

    #[test]
    fn ignored_events_can_be_recorded() {
        let machine = machine(MachineOptions {
            record_ignored: true,
            ..MachineOptions::default()
        });

        machine.send(E::Bogus).unwrap();

        let history = machine.history();
        let record = history.last().unwrap();
        assert_eq!(record.cause, TransitionCause::Ignored);
        assert_eq!(record.from, record.to);
    }

    #[test]
    fn failed_action_rolls_back_state_and_context() {
        let table = Arc::new(
            TableBuilder::new()
                .state(StateSpec::compound(S::Root, S::Idle))
                .state(StateSpec::atomic(S::Idle).child_of(S::Root).on_spec(
                    E::Start,
                    crate::table::TransitionSpec {
                        target: S::Busy,
                        guard: None,
                        action: Some(Action::try_new(|_| Err("boom".into()))),
                    },
                ))
                .state(StateSpec::atomic(S::Busy).child_of(S::Root))
                .build()
                .unwrap(),
        );
        let machine = Machine::new(
            table,
            Ctx::new(),
            Arc::new(ManualClock::new()),
            MachineOptions::default(),
        )
        .unwrap();

        let err = machine.send(E::Start).unwrap_err();

        assert!(matches!(err, MachineError::Action { .. }));
        assert_eq!(machine.current_state(), S::Idle);
        assert_eq!(machine.context(), Ctx::new());
        assert!(machine.history().is_empty());

        // The machine stays usable after a failed transition.
        machine.send(E::Bogus).unwrap();
    }

    #[test]
    fn hooks_run_exit_first_then_action_then_entry() {
        let table = Arc::new(
            TableBuilder::new()
                .state(StateSpec::compound(S::Root, S::Idle))
                .state(
                    StateSpec::atomic(S::Idle)
                        .child_of(S::Root)
                        .on_spec(
                            E::Start,
                            crate::builder::goto_with(S::Busy, |c: Ctx| c.mark("action")),
                        )
                        .on_exit(Hook::new(|c: Ctx| c.mark("exit-idle"))),
                )
                .state(
                    StateSpec::atomic(S::Busy)
                        .child_of(S::Root)
                        .on_entry(Hook::new(|c: Ctx| c.mark("enter-busy"))),
                )
                .build()
                .unwrap(),
        );
        let machine = Machine::new(
            table,
            Ctx::new(),
            Arc::new(ManualClock::new()),
            MachineOptions::default(),
        )
        .unwrap();

        machine.send(E::Start).unwrap();

        assert_eq!(
            machine.context().trace,
            vec!["exit-idle", "action", "enter-busy"]
        );
    }

    #[test]
    fn emitted_events_are_processed_in_the_same_send() {
        let table = Arc::new(
            TableBuilder::new()
                .state(StateSpec::compound(S::Root, S::Idle).on(E::Finish, S::Done))
                .state(StateSpec::atomic(S::Idle).child_of(S::Root).on_spec(
                    E::Start,
                    crate::builder::goto_emitting(S::Busy, |c: Ctx, emitter| {
                        emitter.emit(E::Finish);
                        c
                    }),
                ))
                .state(StateSpec::atomic(S::Busy).child_of(S::Root))
                .state(StateSpec::atomic(S::Done).child_of(S::Root))
                .build()
                .unwrap(),
        );
        let machine = Machine::new(
            table,
            Ctx::new(),
            Arc::new(ManualClock::new()),
            MachineOptions::default(),
        )
        .unwrap();

        machine.send(E::Start).unwrap();

        assert_eq!(machine.current_state(), S::Done);
        assert_eq!(machine.history().len(), 2);
    }

    #[test]
    fn immediate_transient_chain_settles_under_guard() {
        // No event-keyed transitions here, so the event type is spelled
        // out.
        let table = Arc::new(
            TableBuilder::<S, Ctx, E>::new()
                .state(StateSpec::compound(S::Root, S::Busy))
                .state(StateSpec::atomic(S::Busy).child_of(S::Root).transient(
                    crate::table::TransientSpec {
                        delay: TransientDelay::Immediate,
                        target: S::Busy,
                        guard: Some(Guard::new(|c: &Ctx| c.count < 3)),
                        action: Some(Action::new(|c: Ctx| Ctx {
                            count: c.count + 1,
                            ..c
                        })),
                    },
                ))
                .build()
                .unwrap(),
        );
        let machine = Machine::new(
            table,
            Ctx::new(),
            Arc::new(ManualClock::new()),
            MachineOptions::default(),
        )
        .unwrap();

        // Settled during construction: the self-targeting transient fires
        // until its guard fails.
        assert_eq!(machine.context().count, 3);
        assert_eq!(machine.current_state(), S::Busy);
        assert!(machine
            .history()
            .records()
            .all(|r| r.cause == TransitionCause::Transient));
    }

    #[test]
    fn unguarded_transient_loop_is_detected() {
        let table = Arc::new(
            TableBuilder::<S, Ctx, E>::new()
                .state(StateSpec::compound(S::Root, S::Busy))
                .state(
                    StateSpec::atomic(S::Busy)
                        .child_of(S::Root)
                        .transient_immediate(S::Busy),
                )
                .build()
                .unwrap(),
        );
        let err = match Machine::new(
            table,
            Ctx::new(),
            Arc::new(ManualClock::new()),
            MachineOptions {
                transient_chain_limit: 8,
                ..MachineOptions::default()
            },
        ) {
            Ok(_) => panic!("construction must reject an unguarded transient loop"),
            Err(error) => error,
        };

        assert!(matches!(err, MachineError::TransientLoop { limit: 8, .. }));
    }

    #[test]
    fn delayed_transient_fires_on_clock_advance() {
        let clock = Arc::new(ManualClock::new());
        let table = Arc::new(
            TableBuilder::<S, Ctx, E>::new()
                .state(StateSpec::compound(S::Root, S::Busy))
                .state(
                    StateSpec::atomic(S::Busy)
                        .child_of(S::Root)
                        .transient_after(Duration::from_millis(50), S::Done),
                )
                .state(StateSpec::atomic(S::Done).child_of(S::Root))
                .build()
                .unwrap(),
        );
        let machine = Machine::new(
            table,
            Ctx::new(),
            Arc::clone(&clock) as Arc<dyn Clock>,
            MachineOptions::default(),
        )
        .unwrap();

        assert_eq!(machine.current_state(), S::Busy);

        clock.advance(Duration::from_millis(49));
        assert_eq!(machine.current_state(), S::Busy);

        clock.advance(Duration::from_millis(1));
        assert_eq!(machine.current_state(), S::Done);
        assert_eq!(
            machine.history().last().unwrap().cause,
            TransitionCause::Transient
        );
    }

    #[test]
    fn exiting_a_state_cancels_its_delayed_transient() {
        let clock = Arc::new(ManualClock::new());
        let table = Arc::new(
            TableBuilder::new()
                .state(StateSpec::compound(S::Root, S::Busy))
                .state(
                    StateSpec::atomic(S::Busy)
                        .child_of(S::Root)
                        .on(E::Finish, S::Idle)
                        .transient_after(Duration::from_millis(50), S::Done),
                )
                .state(StateSpec::atomic(S::Idle).child_of(S::Root))
                .state(StateSpec::atomic(S::Done).child_of(S::Root))
                .build()
                .unwrap(),
        );
        let machine = Machine::new(
            table,
            Ctx::new(),
            Arc::clone(&clock) as Arc<dyn Clock>,
            MachineOptions::default(),
        )
        .unwrap();

        machine.send(E::Finish).unwrap();
        clock.advance(Duration::from_millis(100));

        assert_eq!(machine.current_state(), S::Idle);
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn deferred_timer_error_keeps_the_sent_event_queued() {
        let clock = Arc::new(ManualClock::new());
        let table = Arc::new(
            TableBuilder::new()
                .state(StateSpec::compound(S::Root, S::Busy))
                .state(
                    StateSpec::atomic(S::Busy)
                        .child_of(S::Root)
                        .on(E::Finish, S::Idle)
                        .transient(crate::table::TransientSpec {
                            delay: TransientDelay::After(Duration::from_millis(50)),
                            target: S::Done,
                            guard: None,
                            action: Some(Action::try_new(|_| Err("flaky".into()))),
                        }),
                )
                .state(StateSpec::atomic(S::Idle).child_of(S::Root))
                .state(StateSpec::atomic(S::Done).child_of(S::Root))
                .build()
                .unwrap(),
        );
        let machine = Machine::new(
            table,
            Ctx::new(),
            Arc::clone(&clock) as Arc<dyn Clock>,
            MachineOptions::default(),
        )
        .unwrap();

        // The timer-driven transition fails and is deferred.
        clock.advance(Duration::from_millis(50));
        assert_eq!(machine.current_state(), S::Busy);

        let err = machine.send(E::Finish).unwrap_err();
        assert!(matches!(err, MachineError::Action { .. }));
        assert_eq!(machine.current_state(), S::Busy);

        // The event stayed queued and is processed by the next call.
        machine.send(E::Bogus).unwrap();
        assert_eq!(machine.current_state(), S::Idle);
    }

    #[test]
    fn force_state_bypasses_resolution_and_records_reason() {
        let machine = machine(MachineOptions::default());

        machine.force_state(S::Done, "operator override").unwrap();

        assert_eq!(machine.current_state(), S::Done);
        assert_eq!(
            machine.history().last().unwrap().cause,
            TransitionCause::Forced("operator override".to_string())
        );
    }

    #[test]
    fn force_state_rejects_undeclared_targets() {
        let machine = machine(MachineOptions::default());

        let err = machine.force_state(S::Orphan, "nope").unwrap_err();

        assert!(matches!(err, MachineError::UnknownState(_)));
        assert_eq!(machine.current_state(), S::Idle);
    }

    #[test]
    fn dispose_blocks_mutation_but_keeps_reads() {
        let machine = machine(MachineOptions::default());
        machine.send(E::Start).unwrap();

        machine.dispose();
        machine.dispose();

        assert!(machine.is_disposed());
        assert!(matches!(machine.send(E::Finish), Err(MachineError::Disposed)));
        assert!(matches!(
            machine.force_state(S::Idle, "x"),
            Err(MachineError::Disposed)
        ));
        assert_eq!(machine.current_state(), S::Busy);
        assert_eq!(machine.history().len(), 1);
    }

    #[test]
    fn update_context_notifies_without_history() {
        let machine = machine(MachineOptions::default());
        let saw_context_change = Arc::new(StdMutex::new(false));

        let flag = Arc::clone(&saw_context_change);
        let _subscription = machine.subscribe(move |notification| {
            if matches!(notification, Notification::ContextChanged) {
                *lock(&flag) = true;
            }
        });

        machine.update_context(|c| Ctx { count: 42, ..c }).unwrap();

        assert_eq!(machine.context().count, 42);
        assert!(*lock(&saw_context_change));
        assert!(machine.history().is_empty());
    }

    #[test]
    fn subscribers_observe_the_settled_machine() {
        let machine = machine(MachineOptions::default());
        let observed = Arc::new(StdMutex::new(Vec::new()));

        let probe = machine.clone();
        let sink = Arc::clone(&observed);
        let _subscription = machine.subscribe(move |notification| {
            if let Notification::StateChanged(record) = notification {
                // Re-entrant read: the lock is already released.
                lock(&sink).push((record.to, probe.current_state()));
            }
        });

        machine.send(E::Start).unwrap();

        let observed = lock(&observed).clone();
        assert_eq!(observed, vec![(S::Busy, S::Busy)]);
    }

    #[test]
    fn cancelled_subscription_stops_notifications() {
        let machine = machine(MachineOptions::default());
        let calls = Arc::new(StdMutex::new(0u32));

        let counter = Arc::clone(&calls);
        let subscription = machine.subscribe(move |_| *lock(&counter) += 1);

        machine.send(E::Start).unwrap();
        subscription.cancel();
        machine.send(E::Finish).unwrap();

        assert_eq!(*lock(&calls), 1);
    }

    #[test]
    fn state_cell_tracks_leaf_state() {
        let machine = machine(MachineOptions::default());
        let cell = machine.state_cell();
        let seen = Arc::new(StdMutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _subscription = cell.subscribe(move |state| lock(&sink).push(state));

        assert_eq!(cell.get(), S::Idle);
        machine.send(E::Start).unwrap();

        assert_eq!(cell.get(), S::Busy);
        assert_eq!(*lock(&seen), vec![S::Busy]);
    }

    #[test]
    fn history_retention_bounds_the_log() {
        let machine = machine(MachineOptions {
            history_retention: Some(2),
            ..MachineOptions::default()
        });

        machine.send(E::Start).unwrap();
        machine.send(E::Finish).unwrap();
        machine.send(E::Reset).unwrap();

        let history = machine.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history.last().unwrap().to, S::Idle);
    }
}
