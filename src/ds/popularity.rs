//! Exponentially decayed popularity scores.
//!
//! Every tracked key carries a score and the tick at which that score was last
//! brought up to date. A single logical clock is shared by all keys of one
//! tracker: each [`increment`](PopularityTracker::increment) advances it by one.
//! Scores are not decayed on increment; [`decay`](PopularityTracker::decay)
//! catches a key up to the current tick, which the purge pass does for every
//! held key before ranking.
//!
//! ```text
//!   tick:        0   1   2   3   4   5   6
//!   increments:  A   A   B   B   A   C   C
//!
//!   decay(A) at tick 7:
//!     span  = 7 - last_tick(A) = 7 - 4 = 3
//!     score = 3 * (1 - rate)^3
//! ```
//!
//! The decay rate is usually derived with [`solve_decay_rate`]: "a key with
//! popularity `initial` that is not touched while `rounds` other increments
//! happen should fall to `target`".
//!
//! ## Example
//!
//! ```
//! use identity_cache::ds::popularity::{solve_decay_rate, PopularityTracker};
//!
//! let rate = solve_decay_rate(1000.0, 10_000, 2.0).unwrap();
//! let mut tracker = PopularityTracker::new(rate);
//!
//! tracker.increment(&"a");
//! tracker.increment(&"b");
//! tracker.decay(&"a");
//! assert!(tracker.score(&"a").unwrap() < 1.0);
//! assert_eq!(tracker.tick(), 2);
//! ```

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::error::ConfigError;

/// Score record for a single key.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Popularity {
    score: f64,
    last_tick: u64,
}

/// Per-key decayed access counter with a shared logical clock.
#[derive(Debug, Clone)]
pub struct PopularityTracker<K> {
    entries: FxHashMap<K, Popularity>,
    tick: u64,
    decay_rate: f64,
}

impl<K> PopularityTracker<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty tracker decaying at `decay_rate` per tick.
    pub fn new(decay_rate: f64) -> Self {
        Self {
            entries: FxHashMap::default(),
            tick: 0,
            decay_rate,
        }
    }

    /// Adds one to `key`'s score and advances the clock.
    pub fn increment(&mut self, key: &K) {
        let tick = self.tick;
        let entry = self.entries.entry(key.clone()).or_insert(Popularity {
            score: 0.0,
            last_tick: tick,
        });
        entry.score += 1.0;
        entry.last_tick = tick;
        self.tick += 1;
    }

    /// Brings `key`'s score up to the current tick.
    ///
    /// No-op for untracked keys.
    pub fn decay(&mut self, key: &K) {
        let tick = self.tick;
        let factor_ln = (-self.decay_rate).ln_1p();
        if let Some(entry) = self.entries.get_mut(key) {
            let span = tick.saturating_sub(entry.last_tick);
            if span > 0 {
                entry.score *= (span as f64 * factor_ln).exp();
            }
            entry.last_tick = tick;
        }
    }

    /// Returns the stored (possibly not yet decayed) score.
    pub fn score(&self, key: &K) -> Option<f64> {
        self.entries.get(key).map(|p| p.score)
    }

    /// Returns the tick at which `key` was last updated.
    pub fn last_tick(&self, key: &K) -> Option<u64> {
        self.entries.get(key).map(|p| p.last_tick)
    }

    /// Forgets `key`. Returns `true` if it was tracked.
    pub fn remove(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Forgets every key. The clock keeps running.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns `true` if `key` has a score record.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Current value of the logical clock.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    pub fn set_decay_rate(&mut self, decay_rate: f64) {
        self.decay_rate = decay_rate;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over tracked keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }
}

/// Finds the per-tick decay rate that brings `initial` down to `target`
/// after `rounds` ticks.
///
/// Solves `initial * (1 - rate)^rounds = target` for `rate` in `[0, 1)` by
/// bisection. The search stops once the midpoint no longer moves under `f64`
/// precision or lands on one of the bounds.
///
/// # Errors
///
/// Returns [`ConfigError`] when `initial` is not finite, `target <= 1`,
/// `target > initial` or `rounds == 0`.
///
/// # Example
///
/// ```
/// use identity_cache::ds::popularity::solve_decay_rate;
///
/// let rate = solve_decay_rate(1000.0, 10_000, 2.0).unwrap();
/// let projected = 1000.0 * (1.0 - rate).powi(10_000);
/// assert!((projected - 2.0).abs() < 1e-6);
///
/// assert_eq!(solve_decay_rate(50.0, 10, 50.0).unwrap(), 0.0);
/// ```
pub fn solve_decay_rate(initial: f64, rounds: u64, target: f64) -> Result<f64, ConfigError> {
    if !initial.is_finite() {
        return Err(ConfigError::new("initial popularity must be finite"));
    }
    if !(target > 1.0) {
        return Err(ConfigError::new("target popularity must be > 1"));
    }
    if target > initial {
        return Err(ConfigError::new(
            "target popularity cannot be greater than initial popularity",
        ));
    }
    if rounds == 0 {
        return Err(ConfigError::new("rounds must be > 0"));
    }
    if target == initial {
        return Ok(0.0);
    }

    let rounds = rounds as f64;
    let mut low = 0.0_f64;
    let mut high = 1.0_f64;
    let mut rate = (low + high) / 2.0;
    loop {
        let last = rate;
        let projected = initial * (rounds * (-rate).ln_1p()).exp();
        if projected < target {
            high = rate;
            rate = (low + rate) / 2.0;
        } else {
            low = rate;
            rate = (high + rate) / 2.0;
        }
        if rate == last || rate == low || rate == high {
            break;
        }
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(initial: f64, rounds: u64, rate: f64) -> f64 {
        initial * (rounds as f64 * (-rate).ln_1p()).exp()
    }

    mod tracker {
        use super::*;

        #[test]
        fn increment_initializes_and_advances_clock() {
            let mut tracker = PopularityTracker::new(0.5);
            tracker.increment(&1u32);
            assert_eq!(tracker.score(&1), Some(1.0));
            assert_eq!(tracker.last_tick(&1), Some(0));
            assert_eq!(tracker.tick(), 1);

            tracker.increment(&2u32);
            tracker.increment(&1u32);
            assert_eq!(tracker.score(&1), Some(2.0));
            assert_eq!(tracker.last_tick(&1), Some(2));
            assert_eq!(tracker.tick(), 3);
        }

        #[test]
        fn decay_applies_span_since_last_tick() {
            let mut tracker = PopularityTracker::new(0.5);
            tracker.increment(&"a");
            tracker.increment(&"b");
            tracker.increment(&"b");
            // a: last_tick 0, tick 3
            tracker.decay(&"a");
            let score = tracker.score(&"a").unwrap();
            assert!((score - 0.125).abs() < 1e-12);
            assert_eq!(tracker.last_tick(&"a"), Some(3));

            // second decay at the same tick changes nothing
            tracker.decay(&"a");
            assert_eq!(tracker.score(&"a"), Some(score));
        }

        #[test]
        fn decay_of_untracked_key_is_noop() {
            let mut tracker: PopularityTracker<u8> = PopularityTracker::new(0.1);
            tracker.decay(&9);
            assert!(tracker.is_empty());
        }

        #[test]
        fn remove_and_clear_keep_clock() {
            let mut tracker = PopularityTracker::new(0.1);
            tracker.increment(&1u8);
            tracker.increment(&2u8);
            assert!(tracker.remove(&1));
            assert!(!tracker.remove(&1));
            assert_eq!(tracker.len(), 1);
            tracker.clear();
            assert!(tracker.is_empty());
            assert_eq!(tracker.tick(), 2);
        }
    }

    mod solver {
        use super::*;

        #[test]
        fn default_parameters_project_to_target() {
            let rate = solve_decay_rate(1000.0, 10_000, 2.0).unwrap();
            assert!(rate > 0.0 && rate < 1.0);
            assert!((project(1000.0, 10_000, rate) - 2.0).abs() < 1e-6);
        }

        #[test]
        fn equal_target_returns_zero() {
            assert_eq!(solve_decay_rate(1000.0, 5, 1000.0).unwrap(), 0.0);
            assert_eq!(solve_decay_rate(2.5, 1, 2.5).unwrap(), 0.0);
        }

        #[test]
        fn more_rounds_means_slower_decay() {
            let fast = solve_decay_rate(1000.0, 1001, 2.0).unwrap();
            let slow = solve_decay_rate(1000.0, 1003, 2.0).unwrap();
            assert!(slow < fast);
        }

        #[test]
        fn rejects_target_at_or_below_one() {
            let err = solve_decay_rate(1000.0, 10, 1.0).unwrap_err();
            assert!(err.message().contains("> 1"));
            assert!(solve_decay_rate(1000.0, 10, 0.5).is_err());
            assert!(solve_decay_rate(1000.0, 10, f64::NAN).is_err());
        }

        #[test]
        fn rejects_non_finite_initial() {
            for initial in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
                let err = solve_decay_rate(initial, 10, 2.0).unwrap_err();
                assert!(err.message().contains("finite"), "initial={initial}");
            }
        }

        #[test]
        fn rejects_target_above_initial() {
            let err = solve_decay_rate(10.0, 10, 20.0).unwrap_err();
            assert!(err.message().contains("initial"));
        }

        #[test]
        fn rejects_zero_rounds() {
            let err = solve_decay_rate(10.0, 0, 2.0).unwrap_err();
            assert!(err.message().contains("rounds"));
        }

        #[test]
        fn tracker_decay_matches_solver() {
            let rate = solve_decay_rate(1000.0, 40, 2.0).unwrap();
            let mut tracker = PopularityTracker::new(rate);
            for _ in 0..1000 {
                tracker.increment(&"hot");
            }
            // Catch up first so the 40 ticks below are the only decay span.
            tracker.decay(&"hot");
            let before = tracker.score(&"hot").unwrap();
            for _ in 0..40 {
                tracker.increment(&"other");
            }
            tracker.decay(&"hot");
            let score = tracker.score(&"hot").unwrap();
            let expected = before * 2.0 / 1000.0;
            assert!((score - expected).abs() < 1e-9, "score = {score}");
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[cfg_attr(miri, ignore)]
            #[test]
            fn prop_solved_rate_projects_to_target(rounds in 1u64..200_000) {
                let rate = solve_decay_rate(1000.0, rounds, 2.0).unwrap();
                prop_assert!((0.0..1.0).contains(&rate));
                let projected = project(1000.0, rounds, rate);
                prop_assert!((projected - 2.0).abs() < 1e-6, "projected = {}", projected);
            }

            #[cfg_attr(miri, ignore)]
            #[test]
            fn prop_equal_target_is_zero(initial in 1.0001f64..1e9, rounds in 1u64..10_000) {
                prop_assert_eq!(solve_decay_rate(initial, rounds, initial).unwrap(), 0.0);
            }
        }
    }
}
