//! Injected clock and timer provider.
//!
//! The engine never reads wall-clock time or sleeps on its own. History
//! timestamps and transient delays both flow through a [`Clock`] supplied
//! at machine construction, so tests drive everything deterministically
//! with [`ManualClock`] and hosts plug in whatever scheduler they run on.

use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Callback invoked when a scheduled timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send>;

/// Handle to a scheduled timer, used for cancellation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerToken(u64);

impl TimerToken {
    pub(crate) fn new(id: u64) -> Self {
        TimerToken(id)
    }
}

/// Timer and timestamp provider injected into machines and coordinators.
///
/// `schedule` registers a one-shot callback after `delay`; `cancel` makes
/// a pending callback a no-op. Cancelling an already-fired or unknown
/// token does nothing.
pub trait Clock: Send + Sync {
    /// The current instant, used for history timestamps.
    fn now(&self) -> DateTime<Utc>;

    /// Run `callback` once after `delay`.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerToken;

    /// Cancel a pending timer.
    fn cancel(&self, token: &TimerToken);
}

struct PendingTimer {
    id: u64,
    due: DateTime<Utc>,
    callback: TimerCallback,
}

struct ManualClockInner {
    now: DateTime<Utc>,
    next_id: u64,
    pending: Vec<PendingTimer>,
}

/// Deterministic virtual-time clock.
///
/// Time only moves when [`ManualClock::advance`] is called; due callbacks
/// run synchronously inside `advance`, in due order, with the clock's own
/// lock released so callbacks may schedule or cancel further timers.
/// Timers scheduled by a callback within the advanced window also fire
/// during the same `advance` call.
///
/// # Example
///
/// ```rust
/// use harel::{Clock, ManualClock};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let fired = Arc::new(Mutex::new(false));
///
/// let flag = Arc::clone(&fired);
/// clock.schedule(Duration::from_millis(100), Box::new(move || {
///     *flag.lock().unwrap() = true;
/// }));
///
/// clock.advance(Duration::from_millis(99));
/// assert!(!*fired.lock().unwrap());
///
/// clock.advance(Duration::from_millis(1));
/// assert!(*fired.lock().unwrap());
/// ```
pub struct ManualClock {
    inner: Mutex<ManualClockInner>,
}

impl ManualClock {
    /// Create a clock starting at the Unix epoch.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ManualClockInner {
                now: DateTime::<Utc>::UNIX_EPOCH,
                next_id: 0,
                pending: Vec::new(),
            }),
        }
    }

    /// Move virtual time forward, firing due timers in due order.
    pub fn advance(&self, delta: Duration) {
        let target = {
            let inner = lock(&self.inner);
            inner.now + to_chrono(delta)
        };
        loop {
            let next = {
                let mut inner = lock(&self.inner);
                let due_idx = inner
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.id))
                    .map(|(i, _)| i);
                match due_idx {
                    Some(i) => {
                        let timer = inner.pending.swap_remove(i);
                        inner.now = inner.now.max(timer.due);
                        Some(timer.callback)
                    }
                    None => {
                        inner.now = inner.now.max(target);
                        None
                    }
                }
            };
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
    }

    /// Number of timers currently pending.
    pub fn pending_timers(&self) -> usize {
        lock(&self.inner).pending.len()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        lock(&self.inner).now
    }

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerToken {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        let due = inner.now + to_chrono(delay);
        inner.pending.push(PendingTimer { id, due, callback });
        TimerToken::new(id)
    }

    fn cancel(&self, token: &TimerToken) {
        let mut inner = lock(&self.inner);
        inner.pending.retain(|t| t.id != token.0);
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
