//! Victim selection for purge passes.
//!
//! Both selectors work on positions in the hold table's insertion order and
//! return the positions whose holds should be dropped.
//!
//! ```text
//!   holds (insertion order):   [ a   b   c   d   e ]      pressure 40% → n = 2
//!
//!   random_victims:     partial Fisher-Yates over 0..5 → e.g. {3, 0}
//!   least_popular:      scores [9.1 0.4 3.0 0.4 7.7]
//!                       stable ascending → b(1), d(3), c(2), e(4), a(0)
//!                       first n           → {1, 3}
//! ```

/// XorShift64 generator for victim selection.
///
/// Deterministic for a given seed, no system entropy needed.
#[derive(Debug, Clone)]
pub(crate) struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    const FALLBACK_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

    pub(crate) fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { Self::FALLBACK_SEED } else { seed },
        }
    }

    #[inline]
    pub(crate) fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform-ish index in `0..bound`. `bound` must be non-zero.
    #[inline]
    pub(crate) fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

/// Picks `count` distinct positions out of `0..len`.
pub(crate) fn random_victims(len: usize, count: usize, rng: &mut XorShift64) -> Vec<usize> {
    let count = count.min(len);
    let mut positions: Vec<usize> = (0..len).collect();
    for i in 0..count {
        let j = i + rng.below(len - i);
        positions.swap(i, j);
    }
    positions.truncate(count);
    positions
}

/// Positions of the `count` lowest scores. Equal scores keep input order.
pub(crate) fn least_popular(scores: &[f64], count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    order.truncate(count.min(scores.len()));
    order
}
