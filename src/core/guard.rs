//! Guard predicates for controlling state transitions.
//!
//! Guards are pure boolean functions over the machine context that
//! determine whether a transition can execute. They enable declarative
//! transition rules without side effects.

use std::sync::Arc;

/// Pure predicate over the machine context that gates a transition.
///
/// Guards are evaluated during event resolution, before any hook or
/// action runs. They encapsulate pre-conditions as pure functions; a
/// guard must never mutate anything or raise an error - invalid
/// transitions are prevented, not failed.
///
/// # Example
///
/// ```rust
/// use harel::Guard;
///
/// #[derive(Clone)]
/// struct Counter {
///     value: u32,
/// }
///
/// let below_limit = Guard::new(|c: &Counter| c.value < 10);
///
/// assert!(below_limit.check(&Counter { value: 3 }));
/// assert!(!below_limit.check(&Counter { value: 10 }));
/// ```
pub struct Guard<C> {
    predicate: Arc<dyn Fn(&C) -> bool + Send + Sync>,
}

impl<C> Guard<C> {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic and thread-safe.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Check whether the guard allows a transition given this context.
    ///
    /// Pure - evaluates the predicate without side effects.
    pub fn check(&self, context: &C) -> bool {
        (self.predicate)(context)
    }
}

impl<C> Clone for Guard<C> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}
