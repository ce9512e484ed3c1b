//! Observation surface: notifications, subscriptions, and state cells.

use crate::core::{EventId, StateId, TransitionRecord};
use std::fmt;
use std::sync::Arc;

/// A change notification delivered to machine subscribers.
///
/// Notifications are dispatched after the machine has fully settled (the
/// run-to-completion drain finished and the lock is released), so a
/// subscriber always observes the post-transition machine and may safely
/// call back into it.
#[derive(Clone, Debug)]
pub enum Notification<S: StateId, E: EventId> {
    /// A transition committed; carries the same record appended to the
    /// history.
    StateChanged(TransitionRecord<S, E>),
    /// The context was replaced without a state change.
    ContextChanged,
}

/// Handle to an active subscription.
///
/// Dropping the handle leaves the subscription in place; call
/// [`Subscription::cancel`] to stop receiving notifications. Disposing
/// the machine cancels all of its subscriptions at once.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop receiving notifications.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

type GetFn<S> = Arc<dyn Fn() -> S + Send + Sync>;
type SubscribeFn<S> = Arc<dyn Fn(Box<dyn Fn(S) + Send + Sync>) -> Subscription + Send + Sync>;

/// A read-only, subscribable view of a machine's current leaf state.
///
/// Cells type-erase the machine behind two closures, so downstream code
/// can observe state without depending on the context or event types.
pub struct StateCell<S: StateId> {
    get: GetFn<S>,
    subscribe: SubscribeFn<S>,
}

impl<S: StateId> StateCell<S> {
    pub(crate) fn from_parts(get: GetFn<S>, subscribe: SubscribeFn<S>) -> Self {
        Self { get, subscribe }
    }

    /// The current leaf state (first region's leaf under a parallel
    /// root).
    pub fn get(&self) -> S {
        (self.get)()
    }

    /// Subscribe to leaf-state changes.
    pub fn subscribe(&self, callback: impl Fn(S) + Send + Sync + 'static) -> Subscription {
        (self.subscribe)(Box::new(callback))
    }
}

impl<S: StateId> Clone for StateCell<S> {
    fn clone(&self) -> Self {
        Self {
            get: Arc::clone(&self.get),
            subscribe: Arc::clone(&self.subscribe),
        }
    }
}

impl<S: StateId> fmt::Debug for StateCell<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell").field("state", &self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_id;
    use std::sync::atomic::{AtomicBool, Ordering};

    state_id! {
        enum S { On, Off }
    }

    #[test]
    fn cancel_runs_once() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let subscription = Subscription::new(move || flag.store(true, Ordering::SeqCst));

        subscription.cancel();

        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn drop_without_cancel_keeps_subscription() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        drop(Subscription::new(move || flag.store(true, Ordering::SeqCst)));

        assert!(!cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn cell_reads_through_the_getter() {
        let cell = StateCell::from_parts(
            Arc::new(|| S::On),
            Arc::new(|_callback| Subscription::new(|| {})),
        );

        assert_eq!(cell.get(), S::On);
        assert_eq!(cell.clone().get(), S::On);
    }
}
