//! Random number generation backed by `rand::rngs::SmallRng`.
//!
//! # Examples
//!
//! ```rust
//! use metro_random::rng;
//!
//! let random_gen = rng();
//! let arrived = random_gen.gen_bool(0.5);
//! # let _ = arrived;
//! ```

use std::sync::{Arc, LazyLock, Mutex};

use ::rand::{Rng as _, RngCore as _, SeedableRng as _, rngs::SmallRng};

use crate::{GenericRng, Rng};

/// The process-wide random number generator, seeded from entropy.
pub static RNG: LazyLock<Rng> = LazyLock::new(Rng::new);

/// Returns a handle sharing state with the process-wide generator.
#[must_use]
pub fn rng() -> Rng {
    RNG.clone()
}

#[derive(Clone)]
pub struct RandRng(Arc<Mutex<SmallRng>>);

impl RandRng {
    /// Creates a generator from an optional seed.
    ///
    /// If `None` is provided, the generator is seeded from entropy.
    #[must_use]
    pub fn new<S: Into<Option<u64>>>(seed: S) -> Self {
        let seed = seed.into();
        log::trace!("RandRng::new seed={seed:?}");
        Self(Arc::new(Mutex::new(
            seed.map_or_else(SmallRng::from_entropy, SmallRng::seed_from_u64),
        )))
    }

    /// # Panics
    ///
    /// * If the internal mutex is poisoned
    /// * If the range is empty
    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: ::rand::distributions::uniform::SampleUniform,
        R: ::rand::distributions::uniform::SampleRange<T>,
    {
        self.0.lock().unwrap().gen_range(range)
    }
}

impl GenericRng for RandRng {
    /// # Panics
    ///
    /// * If the internal mutex is poisoned
    fn next_u32(&self) -> u32 {
        self.0.lock().unwrap().next_u32()
    }

    /// # Panics
    ///
    /// * If the internal mutex is poisoned
    fn next_u64(&self) -> u64 {
        self.0.lock().unwrap().next_u64()
    }

    /// # Panics
    ///
    /// * If the internal mutex is poisoned
    fn next_f64(&self) -> f64 {
        self.0.lock().unwrap().r#gen::<f64>()
    }
}
