//! DeterministicRng - Seeded Randomness for Simulation
//!
//! `TigerStyle`: Every random choice in a DST run comes from one seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// ChaCha20 stream keyed by a `u64` seed.
///
/// Fault injection, operation pickers and generated embeddings all draw from
/// an instance of this, so a seed fully determines a run.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    inner: ChaCha20Rng,
    seed: u64,
}

impl DeterministicRng {
    /// Seed a new stream.
    ///
    /// # Example
    /// ```
    /// use strata_core::dst::DeterministicRng;
    /// let mut a = DeterministicRng::new(42);
    /// let mut b = DeterministicRng::new(42);
    /// assert_eq!(a.next_usize(0, 1_000), b.next_usize(0, 1_000));
    /// ```
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha20Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed this stream was created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform in `[0, 1)`.
    pub fn next_float(&mut self) -> f64 {
        let value: f64 = self.inner.gen();
        debug_assert!((0.0..1.0).contains(&value));
        value
    }

    /// Any `u64`.
    pub fn next_u64(&mut self) -> u64 {
        self.inner.gen()
    }

    /// Uniform in `[low, high]`, both ends included.
    ///
    /// # Panics
    /// Panics if `low > high`.
    pub fn next_usize(&mut self, low: usize, high: usize) -> usize {
        assert!(low <= high, "empty range {low}..={high}");
        self.inner.gen_range(low..=high)
    }

    /// `true` with the given probability.
    ///
    /// # Panics
    /// Panics unless `0.0 <= probability <= 1.0`.
    pub fn next_bool(&mut self, probability: f64) -> bool {
        assert!(
            (0.0..=1.0).contains(&probability),
            "probability {probability} outside [0, 1]"
        );
        self.next_float() < probability
    }

    /// Pick one element.
    ///
    /// # Panics
    /// Panics if `items` is empty.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        assert!(!items.is_empty(), "choose from empty slice");
        &items[self.next_usize(0, items.len() - 1)]
    }

    /// Embedding-shaped vector with components in `[-1, 1)`.
    pub fn next_vector(&mut self, dimensions: usize) -> Vec<f32> {
        (0..dimensions)
            .map(|_| (self.next_float() * 2.0 - 1.0) as f32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_replays_exactly() {
        let mut first = DeterministicRng::new(2_024);
        let mut second = DeterministicRng::new(2_024);

        let a: Vec<usize> = (0..50).map(|_| first.next_usize(0, 9)).collect();
        let b: Vec<usize> = (0..50).map(|_| second.next_usize(0, 9)).collect();
        assert_eq!(a, b);
        assert_eq!(first.next_vector(8), second.next_vector(8));
    }

    #[test]
    fn test_seeds_diverge() {
        let mut a = DeterministicRng::new(1);
        let mut b = DeterministicRng::new(2);
        assert!((0..16).any(|_| a.next_u64() != b.next_u64()));
    }

    #[test]
    fn test_bool_at_the_edges() {
        let mut rng = DeterministicRng::new(3);
        assert!((0..64).all(|_| !rng.next_bool(0.0)));
        assert!((0..64).all(|_| rng.next_bool(1.0)));
    }

    #[test]
    fn test_usize_single_value_range() {
        let mut rng = DeterministicRng::new(4);
        assert_eq!(rng.next_usize(5, 5), 5);
    }

    #[test]
    fn test_vector_shape() {
        let mut rng = DeterministicRng::new(5);
        let embedding = rng.next_vector(384);
        assert_eq!(embedding.len(), 384);
        assert!(embedding.iter().all(|x| (-1.0..1.0).contains(x)));
        assert!(rng.next_vector(0).is_empty());
    }

    #[test]
    #[should_panic(expected = "choose from empty slice")]
    fn test_choose_empty_panics() {
        let mut rng = DeterministicRng::new(6);
        let none: [u8; 0] = [];
        rng.choose(&none);
    }
}
