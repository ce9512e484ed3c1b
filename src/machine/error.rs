//! Runtime errors raised by the engine.

use crate::core::ActionError;
use thiserror::Error;

/// Errors surfaced by machine operations.
///
/// Action and hook failures abort only the offending event's transition;
/// the machine itself stays consistent and keeps processing later events
/// on subsequent calls. The other variants indicate misuse
/// (`Disposed`, `UnknownState`), strict-mode diagnostics (`UnknownEvent`),
/// or configuration bugs caught at runtime (`TransientLoop`).
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("machine has been disposed")]
    Disposed,

    #[error("no state on the active path handles event '{event}' (leaf '{state}')")]
    UnknownEvent { state: String, event: String },

    #[error("state '{0}' is not declared in this machine's table")]
    UnknownState(String),

    #[error("action failed while transitioning from '{from}': {source}")]
    Action {
        from: String,
        #[source]
        source: ActionError,
    },

    #[error("immediate transient chain exceeded {limit} steps at state '{state}'")]
    TransientLoop { state: String, limit: usize },
}
