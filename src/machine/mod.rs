//! The runtime engine: machines, queues, transient scheduling, and the
//! observation surface.

mod cell;
mod core;
mod error;
mod queue;
mod resolver;
mod transient;

pub use cell::{Notification, StateCell, Subscription};
pub use error::MachineError;
pub use self::core::{Machine, MachineOptions};
