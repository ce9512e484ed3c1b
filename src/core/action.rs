//! Context-transforming actions and entry/exit hooks.
//!
//! Actions replace the context wholesale on every transition - they
//! receive the current context by value and return the next one, never
//! mutating in place. An action may also emit follow-up events through an
//! [`Emitter`]; emitted events are appended to the machine's queue when
//! the transition commits, never delivered by a re-entrant call.

use std::sync::Arc;
use thiserror::Error;

/// Failure raised by a user-supplied action or hook.
///
/// Actions must not fail for expected business conditions - guards exist
/// to prevent invalid transitions. An `ActionError` aborts the whole
/// transition atomically: state and context are left unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ActionError(pub String);

impl ActionError {
    /// Create an action error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        ActionError(message.into())
    }
}

impl From<&str> for ActionError {
    fn from(message: &str) -> Self {
        ActionError(message.to_string())
    }
}

impl From<String> for ActionError {
    fn from(message: String) -> Self {
        ActionError(message)
    }
}

/// Collects events emitted by an action during a transition.
///
/// Emitted events are queued behind any events already pending and are
/// processed before `send` returns, as part of the same run-to-completion
/// drain.
#[derive(Debug)]
pub struct Emitter<E> {
    events: Vec<E>,
}

impl<E> Emitter<E> {
    pub(crate) fn new() -> Self {
        Emitter { events: Vec::new() }
    }

    /// Enqueue a follow-up event.
    pub fn emit(&mut self, event: E) {
        self.events.push(event);
    }

    pub(crate) fn into_events(self) -> Vec<E> {
        self.events
    }
}

type ActionFn<C, E> = Arc<dyn Fn(C, &mut Emitter<E>) -> Result<C, ActionError> + Send + Sync>;

/// A transition action: consumes the current context, produces the next.
///
/// # Example
///
/// ```rust
/// use harel::Action;
///
/// #[derive(Clone)]
/// struct Counter {
///     value: u32,
/// }
///
/// let increment: Action<Counter, ()> = Action::new(|c: Counter| Counter { value: c.value + 1 });
/// ```
pub struct Action<C, E> {
    f: ActionFn<C, E>,
}

impl<C, E> Action<C, E> {
    /// Create an action from an infallible pure transform.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(C) -> C + Send + Sync + 'static,
    {
        Action {
            f: Arc::new(move |ctx, _| Ok(f(ctx))),
        }
    }

    /// Create an action from a fallible transform.
    pub fn try_new<F>(f: F) -> Self
    where
        F: Fn(C) -> Result<C, ActionError> + Send + Sync + 'static,
    {
        Action {
            f: Arc::new(move |ctx, _| f(ctx)),
        }
    }

    /// Create an action that may emit follow-up events.
    pub fn with_emitter<F>(f: F) -> Self
    where
        F: Fn(C, &mut Emitter<E>) -> C + Send + Sync + 'static,
    {
        Action {
            f: Arc::new(move |ctx, emitter| Ok(f(ctx, emitter))),
        }
    }

    /// Create a fallible action that may emit follow-up events.
    pub fn try_with_emitter<F>(f: F) -> Self
    where
        F: Fn(C, &mut Emitter<E>) -> Result<C, ActionError> + Send + Sync + 'static,
    {
        Action { f: Arc::new(f) }
    }

    pub(crate) fn run(&self, context: C, emitter: &mut Emitter<E>) -> Result<C, ActionError> {
        (self.f)(context, emitter)
    }
}

impl<C, E> Clone for Action<C, E> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

type HookFn<C> = Arc<dyn Fn(C) -> Result<C, ActionError> + Send + Sync>;

/// An entry or exit hook attached to a state node.
///
/// Entry hooks run top-down over newly entered nodes; exit hooks run
/// bottom-up over nodes being left. Like actions, hooks transform the
/// context by value and abort the transition atomically on failure.
pub struct Hook<C> {
    f: HookFn<C>,
}

impl<C> Hook<C> {
    /// Create a hook from an infallible transform.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(C) -> C + Send + Sync + 'static,
    {
        Hook {
            f: Arc::new(move |ctx| Ok(f(ctx))),
        }
    }

    /// Create a hook from a fallible transform.
    pub fn try_new<F>(f: F) -> Self
    where
        F: Fn(C) -> Result<C, ActionError> + Send + Sync + 'static,
    {
        Hook { f: Arc::new(f) }
    }

    pub(crate) fn run(&self, context: C) -> Result<C, ActionError> {
        (self.f)(context)
    }
}

impl<C> Clone for Hook<C> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Ctx {
        value: u32,
    }

    #[test]
    fn action_transforms_context() {
        let action: Action<Ctx, u8> = Action::new(|c: Ctx| Ctx { value: c.value + 1 });
        let mut emitter = Emitter::new();

        let next = action.run(Ctx { value: 1 }, &mut emitter).unwrap();

        assert_eq!(next, Ctx { value: 2 });
        assert!(emitter.into_events().is_empty());
    }

    #[test]
    fn action_emits_follow_up_events() {
        let action: Action<Ctx, &'static str> = Action::with_emitter(|c: Ctx, emitter| {
            if c.value >= 9 {
                emitter.emit("max-reached");
            }
            Ctx { value: c.value + 1 }
        });

        let mut emitter = Emitter::new();
        let next = action.run(Ctx { value: 9 }, &mut emitter).unwrap();

        assert_eq!(next.value, 10);
        assert_eq!(emitter.into_events(), vec!["max-reached"]);
    }

    #[test]
    fn fallible_action_surfaces_error() {
        let action: Action<Ctx, u8> =
            Action::try_new(|_| Err(ActionError::new("downstream unavailable")));
        let mut emitter = Emitter::new();

        let err = action.run(Ctx { value: 0 }, &mut emitter).unwrap_err();

        assert_eq!(err, ActionError::new("downstream unavailable"));
    }

    #[test]
    fn hook_transforms_context() {
        let hook = Hook::new(|c: Ctx| Ctx { value: c.value * 2 });

        let next = hook.run(Ctx { value: 4 }).unwrap();

        assert_eq!(next.value, 8);
    }

    #[test]
    fn fallible_hook_surfaces_error() {
        let hook: Hook<Ctx> = Hook::try_new(|_| Err("hook failed".into()));

        assert!(hook.run(Ctx { value: 0 }).is_err());
    }
}
