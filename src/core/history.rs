//! State transition history tracking.
//!
//! The engine appends one record per committed transition. History is
//! query-only for consumers (UI, telemetry, bridges) and may be bounded
//! by a retention count, evicting the oldest records first.

use super::state::{EventId, StateId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// What caused a transition record to be appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionCause {
    /// An external or emitted event resolved to a transition.
    Event,
    /// A transient (immediate or delayed) auto-transition fired.
    Transient,
    /// `force_state` bypassed transition resolution; carries the caller's
    /// reason string.
    Forced(String),
    /// The event matched nothing; recorded only when telemetry is enabled.
    Ignored,
}

/// Record of a single state transition.
///
/// # Example
///
/// ```rust
/// use harel::{TransitionCause, TransitionRecord};
/// use harel::{state_id, event_id};
/// use chrono::Utc;
///
/// state_id! {
///     enum Phase { Draft, Review }
/// }
/// event_id! {
///     enum Ev { Submit }
/// }
///
/// let record = TransitionRecord {
///     from: Phase::Draft,
///     to: Phase::Review,
///     event: Some(Ev::Submit),
///     cause: TransitionCause::Event,
///     timestamp: Utc::now(),
///     since_previous: None,
/// };
/// assert_eq!(record.to, Phase::Review);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TransitionRecord<S: StateId, E: EventId> {
    /// The leaf state being transitioned from.
    pub from: S,
    /// The leaf state settled into.
    pub to: S,
    /// The triggering event, if the transition was event-driven.
    pub event: Option<E>,
    /// Why the record exists.
    pub cause: TransitionCause,
    /// When the transition committed, per the injected clock.
    pub timestamp: DateTime<Utc>,
    /// Elapsed time since the previous record, if any.
    pub since_previous: Option<Duration>,
}

/// Ordered history of committed transitions.
///
/// Append-only from the engine's side; optionally bounded. Failed or
/// aborted transitions never append a record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TransitionHistory<S: StateId, E: EventId> {
    records: VecDeque<TransitionRecord<S, E>>,
    retention: Option<usize>,
}

impl<S: StateId, E: EventId> Default for TransitionHistory<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StateId, E: EventId> TransitionHistory<S, E> {
    /// Create a new unbounded history.
    pub fn new() -> Self {
        Self {
            records: VecDeque::new(),
            retention: None,
        }
    }

    /// Create a history that retains at most `retention` records,
    /// evicting the oldest.
    pub fn bounded(retention: usize) -> Self {
        Self {
            records: VecDeque::new(),
            retention: Some(retention),
        }
    }

    /// Append a record, evicting the oldest if over the retention bound.
    pub(crate) fn push(&mut self, record: TransitionRecord<S, E>) {
        self.records.push_back(record);
        if let Some(limit) = self.retention {
            while self.records.len() > limit {
                self.records.pop_front();
            }
        }
    }

    /// All retained records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord<S, E>> {
        self.records.iter()
    }

    /// The most recent record.
    pub fn last(&self) -> Option<&TransitionRecord<S, E>> {
        self.records.back()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no records are retained.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The sequence of leaf states traversed: the first record's `from`,
    /// then each record's `to`.
    pub fn path(&self) -> Vec<S> {
        let mut path = Vec::new();
        if let Some(first) = self.records.front() {
            path.push(first.from);
        }
        for record in &self.records {
            path.push(record.to);
        }
        path
    }

    /// Total duration from the first to the last retained record.
    ///
    /// Returns `None` when the history is empty.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.records.front(), self.records.back()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }
}
