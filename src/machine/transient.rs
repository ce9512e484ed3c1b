//! Bookkeeping for armed delayed transients.
//!
//! Each delayed transient armed on state entry gets a generation number.
//! A timer completion carries the generation it was armed with; if the
//! state was exited (and possibly re-entered) in the meantime the
//! generations no longer match and the completion is dropped. This makes
//! cancellation races harmless without coordinating with the clock.

use crate::clock::TimerToken;
use crate::core::StateId;
use std::collections::HashMap;

pub(crate) struct TransientTimers<S: StateId> {
    armed: HashMap<S, (TimerToken, u64)>,
    next_generation: u64,
}

impl<S: StateId> TransientTimers<S> {
    pub fn new() -> Self {
        Self {
            armed: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Reserve the generation for a timer about to be scheduled.
    pub fn next_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    /// Record a scheduled timer for `state`.
    pub fn arm(&mut self, state: S, token: TimerToken, generation: u64) {
        self.armed.insert(state, (token, generation));
    }

    /// True if `state` still has this exact arming outstanding.
    pub fn matches(&self, state: S, generation: u64) -> bool {
        self.armed
            .get(&state)
            .map_or(false, |(_, armed_gen)| *armed_gen == generation)
    }

    /// Forget the arming for `state`, returning its token for
    /// cancellation.
    pub fn disarm(&mut self, state: S) -> Option<TimerToken> {
        self.armed.remove(&state).map(|(token, _)| token)
    }

    /// Forget every arming, returning all tokens.
    pub fn drain_all(&mut self) -> Vec<TimerToken> {
        self.armed.drain().map(|(_, (token, _))| token).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_id;

    state_id! {
        enum S { Waiting, Cooling }
    }

    #[test]
    fn generation_mismatch_after_disarm() {
        let mut timers: TransientTimers<S> = TransientTimers::new();
        let generation = timers.next_generation();
        timers.arm(S::Waiting, TimerToken::new(10), generation);

        assert!(timers.matches(S::Waiting, generation));

        timers.disarm(S::Waiting);
        assert!(!timers.matches(S::Waiting, generation));
    }

    #[test]
    fn rearming_invalidates_the_old_generation() {
        let mut timers: TransientTimers<S> = TransientTimers::new();
        let first = timers.next_generation();
        timers.arm(S::Waiting, TimerToken::new(10), first);

        let second = timers.next_generation();
        timers.arm(S::Waiting, TimerToken::new(11), second);

        assert!(!timers.matches(S::Waiting, first));
        assert!(timers.matches(S::Waiting, second));
    }

    #[test]
    fn drain_all_returns_every_token() {
        let mut timers: TransientTimers<S> = TransientTimers::new();
        let g1 = timers.next_generation();
        timers.arm(S::Waiting, TimerToken::new(10), g1);
        let g2 = timers.next_generation();
        timers.arm(S::Cooling, TimerToken::new(11), g2);

        let tokens = timers.drain_all();

        assert_eq!(tokens.len(), 2);
        assert!(!timers.matches(S::Waiting, g1));
        assert!(!timers.matches(S::Cooling, g2));
    }
}
