//! FIFO event queue serializing everything the engine processes.
//!
//! Events raised by actions (via the emitter) and transient timer
//! completions land here instead of re-entering the engine synchronously,
//! keeping ordering auditable and the call stack bounded.

use std::collections::VecDeque;

/// One queued work item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Queued<S, E> {
    /// An event from `send` or an action's emitter.
    External(E),
    /// A delayed transient timer completed for `state`.
    TransientFired { state: S },
}

/// Strictly FIFO queue with front insertion reserved for timer
/// completions, which must run ahead of externally queued events.
pub(crate) struct EventQueue<S, E> {
    items: VecDeque<Queued<S, E>>,
}

impl<S, E> EventQueue<S, E> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub fn push_back(&mut self, item: Queued<S, E>) {
        self.items.push_back(item);
    }

    pub fn push_front(&mut self, item: Queued<S, E>) {
        self.items.push_front(item);
    }

    pub fn pop_front(&mut self) -> Option<Queued<S, E>> {
        self.items.pop_front()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
