//! Core statechart building blocks.
//!
//! This module contains the pure pieces the engine is assembled from:
//! - Identifier traits for states and events
//! - Guard predicates over the machine context
//! - Context-transforming actions, hooks, and the emit side channel
//! - Transition history records
//!
//! Nothing in this module performs scheduling or owns mutable machine
//! state; that lives in [`crate::machine`].

mod action;
mod guard;
mod history;
mod state;

pub use action::{Action, ActionError, Emitter, Hook};
pub use guard::Guard;
pub use history::{TransitionCause, TransitionHistory, TransitionRecord};
pub use state::{EventId, StateId};
