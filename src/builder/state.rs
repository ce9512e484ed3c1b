//! Per-state declaration builder.

use crate::core::{Action, EventId, Guard, Hook, StateId};
use crate::table::{StateKind, TransientDelay, TransientSpec, TransitionSpec};
use std::time::Duration;

/// Reference to a guard: given inline or by registered name.
pub(crate) enum GuardRef<C> {
    Inline(Guard<C>),
    Named(String),
}

/// Reference to an action: given inline or by registered name.
pub(crate) enum ActionRef<C, E> {
    Inline(Action<C, E>),
    Named(String),
}

pub(crate) struct TransitionDecl<S, C, E> {
    pub target: S,
    pub guard: Option<GuardRef<C>>,
    pub action: Option<ActionRef<C, E>>,
}

pub(crate) struct TransientDecl<S, C, E> {
    pub delay: TransientDelay,
    pub target: S,
    pub guard: Option<GuardRef<C>>,
    pub action: Option<ActionRef<C, E>>,
}

/// Declaration of a single state node, built fluently and handed to
/// [`crate::builder::TableBuilder::state`].
///
/// # Example
///
/// ```rust
/// use harel::builder::StateSpec;
/// use harel::{state_id, event_id, Guard};
///
/// state_id! {
///     enum S { Root, Idle, Running }
/// }
/// event_id! {
///     enum E { Start, Stop }
/// }
///
/// #[derive(Clone)]
/// struct Ctx { ready: bool }
///
/// let idle: StateSpec<S, Ctx, E> = StateSpec::atomic(S::Idle)
///     .child_of(S::Root)
///     .on_guarded(E::Start, S::Running, Guard::new(|c: &Ctx| c.ready));
/// ```
pub struct StateSpec<S: StateId, C, E: EventId> {
    pub(crate) id: S,
    pub(crate) kind: StateKind,
    pub(crate) parent: Option<S>,
    pub(crate) initial: Option<S>,
    pub(crate) transitions: Vec<(E, TransitionDecl<S, C, E>)>,
    pub(crate) transient: Option<TransientDecl<S, C, E>>,
    pub(crate) on_entry: Option<Hook<C>>,
    pub(crate) on_exit: Option<Hook<C>>,
}

impl<S: StateId, C, E: EventId> StateSpec<S, C, E> {
    fn new(id: S, kind: StateKind, initial: Option<S>) -> Self {
        Self {
            id,
            kind,
            parent: None,
            initial,
            transitions: Vec::new(),
            transient: None,
            on_entry: None,
            on_exit: None,
        }
    }

    /// Declare a leaf state.
    pub fn atomic(id: S) -> Self {
        Self::new(id, StateKind::Atomic, None)
    }

    /// Declare a compound state that auto-descends into `initial` on
    /// entry.
    pub fn compound(id: S, initial: S) -> Self {
        Self::new(id, StateKind::Compound, Some(initial))
    }

    /// Declare a parallel state whose children are concurrent regions.
    pub fn parallel(id: S) -> Self {
        Self::new(id, StateKind::Parallel, None)
    }

    /// Attach this state under `parent`. A state without a parent is the
    /// root; exactly one such state must exist.
    pub fn child_of(mut self, parent: S) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Declare an unconditional transition.
    pub fn on(mut self, event: E, target: S) -> Self {
        self.transitions.push((
            event,
            TransitionDecl {
                target,
                guard: None,
                action: None,
            },
        ));
        self
    }

    /// Declare a guarded transition.
    pub fn on_guarded(mut self, event: E, target: S, guard: Guard<C>) -> Self {
        self.transitions.push((
            event,
            TransitionDecl {
                target,
                guard: Some(GuardRef::Inline(guard)),
                action: None,
            },
        ));
        self
    }

    /// Declare a transition from a full [`TransitionSpec`].
    pub fn on_spec(mut self, event: E, spec: TransitionSpec<S, C, E>) -> Self {
        self.transitions.push((
            event,
            TransitionDecl {
                target: spec.target,
                guard: spec.guard.map(GuardRef::Inline),
                action: spec.action.map(ActionRef::Inline),
            },
        ));
        self
    }

    /// Declare a transition whose guard and action are looked up by name
    /// in the builder's registry at build time.
    pub fn on_named(
        mut self,
        event: E,
        target: S,
        guard: Option<&str>,
        action: Option<&str>,
    ) -> Self {
        self.transitions.push((
            event,
            TransitionDecl {
                target,
                guard: guard.map(|n| GuardRef::Named(n.to_string())),
                action: action.map(|n| ActionRef::Named(n.to_string())),
            },
        ));
        self
    }

    /// Declare an immediate transient: fires right after entry, ahead of
    /// queued events.
    pub fn transient_immediate(mut self, target: S) -> Self {
        self.transient = Some(TransientDecl {
            delay: TransientDelay::Immediate,
            target,
            guard: None,
            action: None,
        });
        self
    }

    /// Declare a guarded immediate transient.
    pub fn transient_immediate_if(mut self, target: S, guard: Guard<C>) -> Self {
        self.transient = Some(TransientDecl {
            delay: TransientDelay::Immediate,
            target,
            guard: Some(GuardRef::Inline(guard)),
            action: None,
        });
        self
    }

    /// Declare a delayed transient: fires after `delay` on the injected
    /// clock unless the state is exited first.
    pub fn transient_after(mut self, delay: Duration, target: S) -> Self {
        self.transient = Some(TransientDecl {
            delay: TransientDelay::After(delay),
            target,
            guard: None,
            action: None,
        });
        self
    }

    /// Declare a transient from a full [`TransientSpec`].
    pub fn transient(mut self, spec: TransientSpec<S, C, E>) -> Self {
        self.transient = Some(TransientDecl {
            delay: spec.delay,
            target: spec.target,
            guard: spec.guard.map(GuardRef::Inline),
            action: spec.action.map(ActionRef::Inline),
        });
        self
    }

    /// Attach an entry hook, run when this node is entered.
    pub fn on_entry(mut self, hook: Hook<C>) -> Self {
        self.on_entry = Some(hook);
        self
    }

    /// Attach an exit hook, run when this node is left.
    pub fn on_exit(mut self, hook: Hook<C>) -> Self {
        self.on_exit = Some(hook);
        self
    }
}
