//! The immutable transition table.
//!
//! A [`TransitionTable`] is the validated, declarative description of a
//! statechart: a finite tree of state nodes with per-node transition
//! maps, transient specs, and entry/exit hooks. Tables are built through
//! [`crate::builder::TableBuilder`], are immutable afterwards, and are
//! shared between machines via `Arc`.

use crate::core::{Action, EventId, Guard, Hook, StateId};
use std::collections::HashMap;
use std::time::Duration;

/// The structural kind of a state node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StateKind {
    /// A leaf state with no children.
    Atomic,
    /// A state with children, exactly one of which is active at a time;
    /// entering it auto-descends into its initial child.
    Compound,
    /// A state whose children are orthogonal regions, all entered
    /// concurrently.
    Parallel,
}

/// A declared reaction to an event: target state, optional guard,
/// optional context-transforming action.
pub struct TransitionSpec<S: StateId, C, E: EventId> {
    /// State entered when the transition fires.
    pub target: S,
    /// Predicate over the context; the transition is skipped (and the
    /// event keeps bubbling) when it returns false.
    pub guard: Option<Guard<C>>,
    /// Context transform applied between exit and entry hooks.
    pub action: Option<Action<C, E>>,
}

impl<S: StateId, C, E: EventId> Clone for TransitionSpec<S, C, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target,
            guard: self.guard.clone(),
            action: self.action.clone(),
        }
    }
}

/// When a transient auto-transition fires after its state is entered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransientDelay {
    /// Fires synchronously right after entry hooks, ahead of any queued
    /// events.
    Immediate,
    /// Fires after the delay elapses on the injected clock, unless the
    /// state is exited first.
    After(Duration),
}

/// An auto-transition attached to a state, fired on entry.
pub struct TransientSpec<S: StateId, C, E: EventId> {
    /// Immediate or delayed firing.
    pub delay: TransientDelay,
    /// State entered when the transient fires.
    pub target: S,
    /// Evaluated when the transient is due; a false guard leaves the
    /// state settled.
    pub guard: Option<Guard<C>>,
    /// Context transform applied when the transient fires.
    pub action: Option<Action<C, E>>,
}

impl<S: StateId, C, E: EventId> Clone for TransientSpec<S, C, E> {
    fn clone(&self) -> Self {
        Self {
            delay: self.delay,
            target: self.target,
            guard: self.guard.clone(),
            action: self.action.clone(),
        }
    }
}

/// Structural kind of a flattened node. Compound nodes carry their
/// initial child directly, so auto-descent never has to handle a
/// missing one.
#[derive(Copy, Clone)]
pub(crate) enum NodeKind<S: StateId> {
    Atomic,
    Compound { initial: S },
    Parallel,
}

/// One flattened node of the state tree.
pub(crate) struct Node<S: StateId, C, E: EventId> {
    pub kind: NodeKind<S>,
    pub parent: Option<S>,
    pub children: Vec<S>,
    pub transitions: HashMap<E, TransitionSpec<S, C, E>>,
    pub transient: Option<TransientSpec<S, C, E>>,
    pub on_entry: Option<Hook<C>>,
    pub on_exit: Option<Hook<C>>,
}

/// The validated, immutable statechart description.
///
/// Keyed by state identifier; the tree shape lives in the per-node
/// parent/children links. Construction happens exclusively through the
/// builder, which guarantees every invariant the engine relies on
/// (single root, acyclic, declared targets, valid initial children).
pub struct TransitionTable<S: StateId, C, E: EventId> {
    root: S,
    nodes: HashMap<S, Node<S, C, E>>,
}

impl<S: StateId, C, E: EventId> TransitionTable<S, C, E> {
    pub(crate) fn from_parts(root: S, nodes: HashMap<S, Node<S, C, E>>) -> Self {
        Self { root, nodes }
    }

    /// The root state identifier.
    pub fn root(&self) -> S {
        self.root
    }

    /// True if the state is declared in this table.
    pub fn contains(&self, state: S) -> bool {
        self.nodes.contains_key(&state)
    }

    /// The structural kind of a declared state.
    pub fn kind(&self, state: S) -> Option<StateKind> {
        self.nodes.get(&state).map(|n| match n.kind {
            NodeKind::Atomic => StateKind::Atomic,
            NodeKind::Compound { .. } => StateKind::Compound,
            NodeKind::Parallel => StateKind::Parallel,
        })
    }

    /// The parent of a declared state, `None` for the root.
    pub fn parent(&self, state: S) -> Option<S> {
        self.nodes.get(&state).and_then(|n| n.parent)
    }

    /// Number of declared states.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the table declares no states. Never true for a built
    /// table, which always has a root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate all declared state identifiers.
    pub fn states(&self) -> impl Iterator<Item = S> + '_ {
        self.nodes.keys().copied()
    }

    pub(crate) fn node(&self, state: S) -> &Node<S, C, E> {
        // The builder validates every reference; a missing node here is a
        // bug in the table construction itself.
        self.nodes
            .get(&state)
            .unwrap_or_else(|| panic!("state {:?} not declared in table", state))
    }

    /// The path from the root to `state`, inclusive.
    pub fn path_to(&self, state: S) -> Vec<S> {
        let mut path = Vec::new();
        let mut cursor = Some(state);
        while let Some(s) = cursor {
            path.push(s);
            cursor = self.parent(s);
        }
        path.reverse();
        path
    }
}
