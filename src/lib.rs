//! Harel: hierarchical and parallel statecharts with run-to-completion
//! semantics
//!
//! Harel models systems as statecharts: trees of states where compound
//! nodes auto-descend into an initial child, parallel nodes run every
//! child region concurrently, and events bubble from the active leaves
//! toward the root. Actions transform an immutable context value, the
//! engine processes each event to completion before the next, and all
//! timing flows through an injected [`Clock`] so behavior is fully
//! deterministic under test.
//!
//! # Core Concepts
//!
//! - **Table**: an immutable, validated statechart built with
//!   [`builder::TableBuilder`]
//! - **Machine**: a running instance holding the active configuration,
//!   context, and transition history
//! - **Transients**: immediate or delayed auto-transitions armed on state
//!   entry
//! - **Coordinator**: fork, broadcast, synchronize, and join independent
//!   machines
//!
//! # Example
//!
//! ```rust
//! use harel::builder::{StateSpec, TableBuilder};
//! use harel::{event_id, state_id, Machine, MachineOptions, ManualClock};
//! use std::sync::Arc;
//!
//! state_id! {
//!     enum Door { Top, Closed, Open }
//! }
//! event_id! {
//!     enum Ev { Toggle }
//! }
//!
//! let table = TableBuilder::new()
//!     .state(StateSpec::compound(Door::Top, Door::Closed))
//!     .state(StateSpec::atomic(Door::Closed).child_of(Door::Top).on(Ev::Toggle, Door::Open))
//!     .state(StateSpec::atomic(Door::Open).child_of(Door::Top).on(Ev::Toggle, Door::Closed))
//!     .build()
//!     .unwrap();
//!
//! let machine = Machine::new(
//!     Arc::new(table),
//!     (),
//!     Arc::new(ManualClock::new()),
//!     MachineOptions::default(),
//! )
//! .unwrap();
//!
//! machine.send(Ev::Toggle).unwrap();
//! assert_eq!(machine.current_state(), Door::Open);
//! ```

pub mod builder;
pub mod clock;
pub mod coordinator;
pub mod core;
pub mod machine;
pub mod table;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, TimerCallback, TimerToken};
pub use coordinator::{
    CoordinatorError, RegionCoordinator, RegionSpec, SyncError, SyncHandle, SyncStatus,
};
pub use crate::core::{
    Action, ActionError, Emitter, EventId, Guard, Hook, StateId, TransitionCause,
    TransitionHistory, TransitionRecord,
};
pub use machine::{Machine, MachineError, MachineOptions, Notification, StateCell, Subscription};
pub use table::{StateKind, TransientDelay, TransientSpec, TransitionSpec, TransitionTable};
