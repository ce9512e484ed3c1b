//! Identifier traits for statechart states and events.
//!
//! States and events are opaque, comparable tokens - closed enumerations
//! declared per machine definition. No dynamic string states exist at
//! runtime; the tree is keyed by these identifiers.

use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Identifier token for a statechart state.
///
/// State identifiers are small `Copy` values (typically fieldless enums)
/// used to key the state tree, active paths, and history records.
///
/// # Required Traits
///
/// - `Copy + Eq + Hash`: identifiers key maps and ride in paths
/// - `Debug`: identifiers must be debuggable for diagnostics
/// - `Serialize` + `DeserializeOwned`: history records are serializable
///
/// # Example
///
/// ```rust
/// use harel::StateId;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum Door {
///     Open,
///     Closed,
///     Locked,
/// }
///
/// impl StateId for Door {
///     fn name(&self) -> &str {
///         match self {
///             Self::Open => "Open",
///             Self::Closed => "Closed",
///             Self::Locked => "Locked",
///         }
///     }
/// }
///
/// assert_eq!(Door::Locked.name(), "Locked");
/// ```
pub trait StateId:
    Copy + Eq + Hash + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;
}

/// Identifier token for a statechart event.
///
/// Events share the shape of [`StateId`]: closed enumerations compared by
/// value, bubbled from the active leaf toward the root until a handler is
/// found.
///
/// # Example
///
/// ```rust
/// use harel::EventId;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum DoorEvent {
///     Toggle,
///     Lock,
/// }
///
/// impl EventId for DoorEvent {
///     fn name(&self) -> &str {
///         match self {
///             Self::Toggle => "Toggle",
///             Self::Lock => "Lock",
///         }
///     }
/// }
///
/// assert_eq!(DoorEvent::Lock.name(), "Lock");
/// ```
pub trait EventId:
    Copy + Eq + Hash + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Get the event's name for display/logging.
    fn name(&self) -> &str;
}
