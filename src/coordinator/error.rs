//! Errors raised by the region coordinator.

use crate::machine::MachineError;
use thiserror::Error;

/// Errors surfaced by coordinator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("no region named '{0}'")]
    UnknownRegion(String),

    #[error("region '{0}' has been disposed")]
    RegionDisposed(String),

    #[error("a region named '{0}' is already active")]
    DuplicateRegion(String),

    #[error(transparent)]
    Machine(#[from] MachineError),
}

/// Failure mode of a synchronization wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("synchronization wait timed out")]
    Timeout,
}
