//! Construction-time validation errors.

use thiserror::Error;

/// Errors reported when building a transition table.
///
/// All of these are configuration bugs: construction fails fast and no
/// table is produced. State and event names are carried as strings so the
/// error type stays independent of the identifier types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("state '{0}' is declared more than once")]
    DuplicateState(String),

    #[error("no root state declared; exactly one state must have no parent")]
    NoRoot,

    #[error("states '{0}' and '{1}' both lack a parent; only one root is allowed")]
    MultipleRoots(String, String),

    #[error("state '{child}' names undeclared parent '{parent}'")]
    UnknownParent { child: String, parent: String },

    #[error("state '{state}' declares a transition on '{event}' to undeclared state '{target}'")]
    UnknownTarget {
        state: String,
        event: String,
        target: String,
    },

    #[error("state '{state}' declares a transient transition to undeclared state '{target}'")]
    UnknownTransientTarget { state: String, target: String },

    #[error("state '{state}' declares more than one transition for event '{event}'")]
    DuplicateTransition { state: String, event: String },

    #[error("compound state '{state}' names initial child '{child}', which is not one of its children")]
    InvalidInitialChild { state: String, child: String },

    #[error("atomic state '{state}' has children; declare it compound or parallel")]
    ChildrenOnAtomic { state: String },

    #[error("parallel state '{state}' has no child regions")]
    EmptyParallel { state: String },

    #[error("state '{0}' is not reachable from the root")]
    UnreachableState(String),

    #[error("guard '{0}' is referenced but never registered")]
    UndeclaredGuard(String),

    #[error("action '{0}' is referenced but never registered")]
    UndeclaredAction(String),
}
