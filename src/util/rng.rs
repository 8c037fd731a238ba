//! [PRNG] utilities for backoff jitter.
//!
//! A [`HasherRng`] derives pseudo random values from a [`Hasher`] seeded by
//! [`RandomState`], avoiding a dependency on `rand` for the little randomness
//! jitter needs.
//!
//! [PRNG]: https://en.wikipedia.org/wiki/Pseudorandom_number_generator

use std::{
    collections::hash_map::RandomState,
    hash::{BuildHasher, Hasher},
};

/// A simple [PRNG] trait.
///
/// [PRNG]: https://en.wikipedia.org/wiki/Pseudorandom_number_generator
pub(crate) trait Rng {
    /// Generate a random [`u64`].
    fn next_u64(&mut self) -> u64;

    /// Generate a random [`f64`] between `[0, 1)`.
    fn next_f64(&mut self) -> f64 {
        // Borrowed from:
        // https://github.com/rust-random/rand/blob/master/src/distributions/float.rs#L106
        let float_size = std::mem::size_of::<f64>() as u32 * 8;
        let precision = 52 + 1;
        let scale = 1.0 / ((1u64 << precision) as f64);

        let value = self.next_u64();
        let value = value >> (float_size - precision);

        scale * value as f64
    }
}

/// A [`Rng`] implementation that hashes an internal counter.
#[derive(Clone, Debug)]
pub(crate) struct HasherRng<H = RandomState> {
    hasher: H,
    counter: u64,
}

impl Default for HasherRng {
    fn default() -> Self {
        HasherRng {
            hasher: RandomState::default(),
            counter: 0,
        }
    }
}

impl<H> Rng for HasherRng<H>
where
    H: BuildHasher,
{
    fn next_u64(&mut self) -> u64 {
        let mut hasher = self.hasher.build_hasher();
        hasher.write_u64(self.counter);
        self.counter = self.counter.wrapping_add(1);
        hasher.finish()
    }
}
