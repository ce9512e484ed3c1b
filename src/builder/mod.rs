//! Builder API for declaring and validating statecharts.
//!
//! This module provides the fluent construction surface: per-state
//! declarations ([`StateSpec`]), the whole-table builder
//! ([`TableBuilder`]) with its named guard/action registry, identifier
//! macros, and small helpers for common transition shapes.

pub mod error;
pub mod macros;
mod state;
mod table;

pub use error::ConfigError;
pub use state::StateSpec;
pub use table::TableBuilder;

use crate::core::{Action, Emitter, EventId, Guard, StateId};
use crate::table::TransitionSpec;

/// An unconditional transition to `target`.
pub fn goto<S, C, E>(target: S) -> TransitionSpec<S, C, E>
where
    S: StateId,
    E: EventId,
{
    TransitionSpec {
        target,
        guard: None,
        action: None,
    }
}

/// A transition to `target` gated by a predicate over the context.
///
/// # Example
///
/// ```
/// use harel::builder::goto_if;
/// use harel::{event_id, state_id};
///
/// state_id! {
///     enum S { Idle, Busy }
/// }
/// event_id! {
///     enum Ev { Poll }
/// }
///
/// #[derive(Clone)]
/// struct Ctx { jobs: usize }
///
/// let spec = goto_if::<_, _, Ev, _>(S::Busy, |c: &Ctx| c.jobs > 0);
/// assert!(spec.guard.is_some());
/// ```
pub fn goto_if<S, C, E, F>(target: S, predicate: F) -> TransitionSpec<S, C, E>
where
    S: StateId,
    E: EventId,
    F: Fn(&C) -> bool + Send + Sync + 'static,
{
    TransitionSpec {
        target,
        guard: Some(Guard::new(predicate)),
        action: None,
    }
}

/// A transition to `target` that transforms the context.
pub fn goto_with<S, C, E, F>(target: S, f: F) -> TransitionSpec<S, C, E>
where
    S: StateId,
    E: EventId,
    F: Fn(C) -> C + Send + Sync + 'static,
{
    TransitionSpec {
        target,
        guard: None,
        action: Some(Action::new(f)),
    }
}

/// A transition to `target` whose action may emit follow-up events.
pub fn goto_emitting<S, C, E, F>(target: S, f: F) -> TransitionSpec<S, C, E>
where
    S: StateId,
    E: EventId,
    F: Fn(C, &mut Emitter<E>) -> C + Send + Sync + 'static,
{
    TransitionSpec {
        target,
        guard: None,
        action: Some(Action::with_emitter(f)),
    }
}
