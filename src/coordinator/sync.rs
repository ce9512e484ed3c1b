//! Synchronization handles for cross-region waits.

use crate::clock::lock;
use crate::coordinator::error::SyncError;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Where a synchronization wait currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// Conditions not yet met.
    Pending,
    /// Every condition held at some state change (or already at
    /// registration).
    Resolved,
    /// The timeout elapsed first.
    TimedOut,
}

type SettleFn = Box<dyn FnOnce(Result<(), SyncError>) + Send>;

pub(crate) struct SyncWaitState {
    status: SyncStatus,
    callbacks: Vec<SettleFn>,
}

/// Handle to an in-flight [`wait_for_sync`](crate::RegionCoordinator::wait_for_sync)
/// or [`join`](crate::RegionCoordinator::join).
///
/// The handle is passive: it never blocks. Poll it with
/// [`SyncHandle::status`] or register a callback with
/// [`SyncHandle::on_settle`], which fires at most once, immediately if
/// the wait has already settled.
#[derive(Clone)]
pub struct SyncHandle {
    state: Arc<Mutex<SyncWaitState>>,
}

impl SyncHandle {
    pub(crate) fn pending() -> Self {
        Self {
            state: Arc::new(Mutex::new(SyncWaitState {
                status: SyncStatus::Pending,
                callbacks: Vec::new(),
            })),
        }
    }

    pub(crate) fn resolved() -> Self {
        Self {
            state: Arc::new(Mutex::new(SyncWaitState {
                status: SyncStatus::Resolved,
                callbacks: Vec::new(),
            })),
        }
    }

    /// The current status of the wait.
    pub fn status(&self) -> SyncStatus {
        lock(&self.state).status
    }

    /// True once the conditions were observed to hold.
    pub fn is_resolved(&self) -> bool {
        self.status() == SyncStatus::Resolved
    }

    /// Run `callback` when the wait settles; `Err(SyncError::Timeout)`
    /// when the timeout won. Runs immediately if already settled.
    pub fn on_settle(&self, callback: impl FnOnce(Result<(), SyncError>) + Send + 'static) {
        let mut state = lock(&self.state);
        match state.status {
            SyncStatus::Pending => state.callbacks.push(Box::new(callback)),
            SyncStatus::Resolved => {
                drop(state);
                callback(Ok(()));
            }
            SyncStatus::TimedOut => {
                drop(state);
                callback(Err(SyncError::Timeout));
            }
        }
    }

    /// Flip to `status` and fire queued callbacks. No-op if already
    /// settled.
    pub(crate) fn settle(&self, status: SyncStatus) {
        let callbacks = {
            let mut state = lock(&self.state);
            if state.status != SyncStatus::Pending {
                return;
            }
            state.status = status;
            std::mem::take(&mut state.callbacks)
        };
        let outcome = match status {
            SyncStatus::TimedOut => Err(SyncError::Timeout),
            _ => Ok(()),
        };
        for callback in callbacks {
            callback(outcome);
        }
    }
}

impl fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHandle")
            .field("status", &self.status())
            .finish()
    }
}
