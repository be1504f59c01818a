#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shared random number generation for the metro simulation.
//!
//! All randomness in the simulation (arrivals, train lengths, destinations and
//! breakdowns) flows through an [`Rng`] handle. The process-wide generator is
//! seeded from entropy; tests build seeded generators with [`Rng::from_seed`]
//! to get reproducible sequences.

pub mod rand;

pub use crate::rand::{RNG, rng};

/// Source of raw random values. Implementations must be shareable across
/// the tasks of the simulation.
pub trait GenericRng: Send + Sync {
    fn next_u32(&self) -> u32;

    fn next_u64(&self) -> u64;

    /// Uniform value in `[0, 1)`.
    fn next_f64(&self) -> f64;
}

/// Clonable handle around a [`GenericRng`] backend. Clones share state.
#[derive(Clone)]
pub struct Rng(crate::rand::RandRng);

impl Default for Rng {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Rng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rng").finish_non_exhaustive()
    }
}

impl Rng {
    #[must_use]
    pub fn new() -> Self {
        Self::from_seed(None)
    }

    pub fn from_seed<S: Into<Option<u64>>>(seed: S) -> Self {
        Self(crate::rand::RandRng::new(seed))
    }

    #[inline]
    #[must_use]
    pub fn next_u32(&self) -> u32 {
        self.0.next_u32()
    }

    #[inline]
    #[must_use]
    pub fn next_u64(&self) -> u64 {
        self.0.next_u64()
    }

    #[inline]
    #[must_use]
    pub fn next_f64(&self) -> f64 {
        self.0.next_f64()
    }

    /// Bernoulli trial that succeeds with probability `p`.
    ///
    /// Values of `p` at or below `0.0` never succeed and values at or above
    /// `1.0` always succeed.
    #[must_use]
    pub fn gen_bool(&self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.next_f64() < p
    }

    /// # Panics
    ///
    /// * If the range is empty
    #[must_use]
    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: ::rand::distributions::uniform::SampleUniform,
        R: ::rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// Picks one element uniformly, or `None` if `items` is empty.
    #[must_use]
    pub fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.gen_range(0..items.len()))
    }
}

impl GenericRng for Rng {
    #[inline]
    fn next_u32(&self) -> u32 {
        self.0.next_u32()
    }

    #[inline]
    fn next_u64(&self) -> u64 {
        self.0.next_u64()
    }

    #[inline]
    fn next_f64(&self) -> f64 {
        self.0.next_f64()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn seeded_rngs_produce_the_same_sequence() {
        let a = Rng::from_seed(7);
        let b = Rng::from_seed(7);

        let left: Vec<u64> = (0..16).map(|_| a.next_u64()).collect();
        let right: Vec<u64> = (0..16).map(|_| b.next_u64()).collect();

        assert_eq!(left, right);
    }

    #[test_log::test]
    fn clones_share_state() {
        let a = Rng::from_seed(7);
        let b = a.clone();
        let fresh = Rng::from_seed(7);

        let _ = a.next_u64();
        assert_eq!(b.next_u64(), {
            let _ = fresh.next_u64();
            fresh.next_u64()
        });
    }

    #[test_log::test]
    fn gen_bool_saturates_at_the_bounds() {
        let rng = Rng::from_seed(1);

        assert!((0..1_000).all(|_| rng.gen_bool(1.0)));
        assert!((0..1_000).all(|_| !rng.gen_bool(0.0)));
    }

    #[test_log::test]
    fn gen_bool_tracks_probability() {
        let rng = Rng::from_seed(99);
        let hits = (0..20_000).filter(|_| rng.gen_bool(0.7)).count();

        #[allow(clippy::cast_precision_loss)]
        let ratio = hits as f64 / 20_000.0;
        assert!((ratio - 0.7).abs() < 0.02, "ratio={ratio}");
    }

    #[test_log::test]
    fn next_f64_is_in_unit_interval() {
        let rng = Rng::from_seed(3);

        for _ in 0..10_000 {
            let value = rng.next_f64();
            assert!((0.0..1.0).contains(&value), "value={value}");
        }
    }

    #[test_log::test]
    fn choose_handles_empty_and_single() {
        let rng = Rng::from_seed(5);
        let empty: [u8; 0] = [];

        assert_eq!(rng.choose(&empty), None);
        assert_eq!(rng.choose(&[42]), Some(&42));
    }
}
