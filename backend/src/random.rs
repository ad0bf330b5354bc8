//! Random Source
//!
//! Every generated value is drawn through [`RandomSource`], so callers can
//! swap the OS-seeded generator for a seeded one (reproducible demos) or a
//! fixed sequence (tests).

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Source of uniform floats in `[0, 1)`
pub trait RandomSource: Send {
    fn next_f64(&mut self) -> f64;

    /// Uniform float in `[lo, hi)`
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }

    /// Uniform integer in `[lo, hi]`
    fn uniform_int(&mut self, lo: u32, hi: u32) -> u32 {
        let span = f64::from(hi - lo + 1);
        // next_f64 < 1 keeps the floor below span; min() guards rounding
        lo + ((self.next_f64() * span).floor() as u32).min(hi - lo)
    }

    /// Uniformly chosen element of a non-empty slice
    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        let idx = (self.next_f64() * items.len() as f64).floor() as usize;
        &items[idx.min(items.len() - 1)]
    }
}

impl RandomSource for StdRng {
    fn next_f64(&mut self) -> f64 {
        self.gen_range(0.0..1.0)
    }
}

/// Generator seeded from OS entropy
pub fn entropy() -> StdRng {
    StdRng::from_entropy()
}

/// Generator producing the same stream for the same seed
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Replays a fixed list of draws, wrapping around at the end
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    values: Vec<f64>,
    cursor: usize,
}

impl SequenceRandom {
    /// # Panics
    /// If `values` is empty.
    pub fn new(values: Vec<f64>) -> Self {
        assert!(!values.is_empty(), "SequenceRandom needs at least one value");
        Self { values, cursor: 0 }
    }

    /// Always returns `value`
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }
}

impl RandomSource for SequenceRandom {
    fn next_f64(&mut self) -> f64 {
        let value = self.values[self.cursor];
        self.cursor = (self.cursor + 1) % self.values.len();
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_wraps() {
        let mut rng = SequenceRandom::new(vec![0.1, 0.2]);
        assert_eq!(rng.next_f64(), 0.1);
        assert_eq!(rng.next_f64(), 0.2);
        assert_eq!(rng.next_f64(), 0.1);
    }

    #[test]
    fn test_uniform_int_covers_upper_bound() {
        let mut rng = SequenceRandom::constant(0.999_999);
        assert_eq!(rng.uniform_int(0, 14), 14);

        let mut rng = SequenceRandom::constant(0.0);
        assert_eq!(rng.uniform_int(25_000, 75_000), 25_000);
    }

    #[test]
    fn test_pick() {
        let items = ["a", "b", "c", "d"];
        let mut rng = SequenceRandom::new(vec![0.0, 0.5, 0.99]);
        assert_eq!(*rng.pick(&items), "a");
        assert_eq!(*rng.pick(&items), "c");
        assert_eq!(*rng.pick(&items), "d");
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = seeded(42);
        let mut b = seeded(42);
        for _ in 0..16 {
            let x = a.next_f64();
            assert_eq!(x, b.next_f64());
            assert!((0.0..1.0).contains(&x));
        }
    }
}
