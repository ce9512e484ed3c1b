//! Macros for declaring identifier enums.

/// Generate a state identifier enum with its [`crate::StateId`] impl.
///
/// # Example
///
/// ```
/// use harel::state_id;
///
/// state_id! {
///     pub enum Phase {
///         Draft,
///         Review,
///         Published,
///     }
/// }
/// ```
#[macro_export]
macro_rules! state_id {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, PartialEq, Eq, Hash, Debug,
            serde::Serialize, serde::Deserialize,
        )]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::StateId for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }
    };
}

/// Generate an event identifier enum with its [`crate::EventId`] impl.
///
/// # Example
///
/// ```
/// use harel::event_id;
///
/// event_id! {
///     pub enum DocEvent {
///         Submit,
///         Approve,
///     }
/// }
/// ```
#[macro_export]
macro_rules! event_id {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, PartialEq, Eq, Hash, Debug,
            serde::Serialize, serde::Deserialize,
        )]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::EventId for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{EventId, StateId};

    state_id! {
        enum TestState {
            Idle,
            Running,
        }
    }

    event_id! {
        enum TestEvent {
            Start,
        }
    }

    #[test]
    fn state_id_macro_generates_trait() {
        assert_eq!(TestState::Idle.name(), "Idle");
        assert_eq!(TestState::Running.name(), "Running");
    }

    #[test]
    fn event_id_macro_generates_trait() {
        assert_eq!(TestEvent::Start.name(), "Start");
    }

    #[test]
    fn macro_supports_visibility() {
        state_id! {
            pub enum PublicState {
                A,
                B,
            }
        }

        let _state = PublicState::A;
        assert_eq!(PublicState::B.name(), "B");
    }
}
