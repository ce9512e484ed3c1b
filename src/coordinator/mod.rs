//! Cross-machine coordination: forked regions, broadcasts, and joins.

mod error;
mod region;
mod sync;

pub use error::{CoordinatorError, SyncError};
pub use region::{RegionCoordinator, RegionSpec};
pub use sync::{SyncHandle, SyncStatus};
