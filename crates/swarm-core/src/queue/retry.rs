//! Retry policy and per-target retry bookkeeping.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::Target;

/// How many crash-triggered retries a target gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Another retry is allowed after `attempts` retries have been used.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryState {
    /// Crash-triggered retries used so far.
    pub attempts: u32,
}

/// Outcome of recording a crash against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue; `attempt` is the 1-based retry number.
    Retry { attempt: u32 },

    /// Budget used up. The state has been discarded.
    Exhausted { attempts: u32 },
}

/// Per-target retry counters.
///
/// Seeded with `attempts = 0` for every target at start and discarded when the
/// target completes or permanently fails.
#[derive(Debug, Default)]
pub struct RetryBook {
    states: HashMap<Target, RetryState>,
}

impl RetryBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&mut self, target: Target) {
        self.states.entry(target).or_default();
    }

    pub fn contains(&self, target: Target) -> bool {
        self.states.contains_key(&target)
    }

    pub fn get(&self, target: Target) -> Option<RetryState> {
        self.states.get(&target).copied()
    }

    pub fn attempts(&self, target: Target) -> u32 {
        self.get(target).map_or(0, |s| s.attempts)
    }

    /// Count a crash and decide between retry and permanent failure.
    ///
    /// A missing state is created with `attempts = 0` first.
    pub fn record_crash(&mut self, target: Target, policy: RetryPolicy) -> RetryDecision {
        let state = self.states.entry(target).or_default();
        if policy.allows_retry(state.attempts) {
            state.attempts += 1;
            RetryDecision::Retry {
                attempt: state.attempts,
            }
        } else {
            let attempts = state.attempts;
            self.states.remove(&target);
            RetryDecision::Exhausted { attempts }
        }
    }

    pub fn discard(&mut self, target: Target) -> Option<RetryState> {
        self.states.remove(&target)
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Target, RetryState)> + '_ {
        self.states.iter().map(|(t, s)| (*t, *s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Target = Target::new(0x401000);

    #[test]
    fn retries_up_to_budget_then_exhausts() {
        let policy = RetryPolicy::new(3);
        let mut book = RetryBook::new();
        book.seed(T);

        assert_eq!(book.record_crash(T, policy), RetryDecision::Retry { attempt: 1 });
        assert_eq!(book.record_crash(T, policy), RetryDecision::Retry { attempt: 2 });
        assert_eq!(book.record_crash(T, policy), RetryDecision::Retry { attempt: 3 });
        assert_eq!(book.attempts(T), 3);
        assert_eq!(book.record_crash(T, policy), RetryDecision::Exhausted { attempts: 3 });
        assert!(!book.contains(T));
    }

    #[test]
    fn zero_budget_fails_on_first_crash() {
        let mut book = RetryBook::new();
        book.seed(T);
        assert_eq!(
            book.record_crash(T, RetryPolicy::new(0)),
            RetryDecision::Exhausted { attempts: 0 }
        );
    }

    #[test]
    fn unseeded_target_starts_at_zero() {
        let mut book = RetryBook::new();
        assert_eq!(
            book.record_crash(T, RetryPolicy::default()),
            RetryDecision::Retry { attempt: 1 }
        );
    }

    #[test]
    fn seeding_twice_keeps_existing_count() {
        let mut book = RetryBook::new();
        book.seed(T);
        book.record_crash(T, RetryPolicy::default());
        book.seed(T);
        assert_eq!(book.attempts(T), 1);
    }
}
