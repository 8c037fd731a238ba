//! This module contains the [backoff] strategies used by the retry policies.
//!
//! The [`Backoff`] trait represents a single backoff session: one initial
//! request and its retries. A [`MakeBackoff`] produces a fresh session for
//! every call to a retry policy.
//!
//! [`ExponentialBackoffMaker`] implements the maker type for
//! [`ExponentialBackoff`], a batteries included exponential backoff and jitter
//! strategy. [`FixedBackoffMaker`] waits the same amount of time before every
//! retry.
//!
//! [backoff]: https://en.wikipedia.org/wiki/Exponential_backoff

use crate::{
    error::ConfigurationError,
    options::fraction,
    util::rng::{HasherRng, Rng},
};
use std::time::Duration;

/// Trait used to construct [`Backoff`] trait implementors.
pub trait MakeBackoff {
    /// The backoff type produced by this maker.
    type Backoff: Backoff;

    /// Constructs a new backoff session.
    fn make_backoff(&self) -> Self::Backoff;
}

/// A backoff session. Each call to [`next_backoff`](Backoff::next_backoff)
/// returns how long to wait before the next retry.
pub trait Backoff {
    /// The delay before the next retry in the sequence.
    fn next_backoff(&mut self) -> Duration;
}

/// A maker type for [`ExponentialBackoff`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoffMaker {
    /// The delay before the first retry.
    min: Duration,
    /// The maximum amount of time to wait before retrying.
    max: Duration,
    /// The ratio of the base delay that may be randomly added to a backoff.
    jitter: f64,
}

/// A jittered [exponential backoff] strategy.
///
/// The delay before retry `n` (counting from zero) is `min * 2^n`, capped at
/// `max`. A random amount of up to `jitter * delay` is then added, never
/// exceeding `max`.
///
/// [exponential backoff]: https://en.wikipedia.org/wiki/Exponential_backoff
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
    jitter: f64,
    rng: HasherRng,
    iterations: u32,
}

/// A maker type for [`FixedBackoff`].
#[derive(Debug, Clone, PartialEq)]
pub struct FixedBackoffMaker {
    delay: Duration,
    max: Duration,
    jitter: f64,
}

/// Waits the same, optionally jittered, delay before every retry.
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    delay: Duration,
    max: Duration,
    jitter: f64,
    rng: HasherRng,
}

// ===== impl ExponentialBackoffMaker =====

impl ExponentialBackoffMaker {
    /// Create a new `ExponentialBackoffMaker`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if:
    /// - `min` > `max`
    /// - `max` is zero
    /// - `jitter` is not a finite value within `[0.0, 1.0]`
    pub fn new(min: Duration, max: Duration, jitter: f64) -> Result<Self, ConfigurationError> {
        if min > max {
            return Err(ConfigurationError::new(
                "base_delay",
                "must not exceed max_delay",
            ));
        }
        if max == Duration::from_millis(0) {
            return Err(ConfigurationError::new("max_delay", "must be > 0"));
        }
        fraction("jitter", jitter)?;

        Ok(ExponentialBackoffMaker { min, max, jitter })
    }
}

impl MakeBackoff for ExponentialBackoffMaker {
    type Backoff = ExponentialBackoff;

    fn make_backoff(&self) -> Self::Backoff {
        ExponentialBackoff {
            min: self.min,
            max: self.max,
            jitter: self.jitter,
            rng: HasherRng::default(),
            iterations: 0,
        }
    }
}

// ===== impl ExponentialBackoff =====

impl ExponentialBackoff {
    fn base(&self) -> Duration {
        debug_assert!(
            self.min <= self.max,
            "maximum backoff must not be less than minimum backoff"
        );
        self.min
            .checked_mul(2_u32.saturating_pow(self.iterations))
            .unwrap_or(self.max)
            .min(self.max)
    }
}

impl Backoff for ExponentialBackoff {
    fn next_backoff(&mut self) -> Duration {
        let base = self.base();
        let next = base + jitter(&mut self.rng, self.jitter, base, self.max);

        self.iterations = self.iterations.saturating_add(1);

        next
    }
}

// ===== impl FixedBackoffMaker =====

impl FixedBackoffMaker {
    /// Create a new `FixedBackoffMaker`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if `delay` > `max` or `jitter` is not
    /// a finite value within `[0.0, 1.0]`.
    pub fn new(delay: Duration, max: Duration, jitter: f64) -> Result<Self, ConfigurationError> {
        if delay > max {
            return Err(ConfigurationError::new(
                "base_delay",
                "must not exceed max_delay",
            ));
        }
        fraction("jitter", jitter)?;

        Ok(FixedBackoffMaker { delay, max, jitter })
    }
}

impl MakeBackoff for FixedBackoffMaker {
    type Backoff = FixedBackoff;

    fn make_backoff(&self) -> Self::Backoff {
        FixedBackoff {
            delay: self.delay,
            max: self.max,
            jitter: self.jitter,
            rng: HasherRng::default(),
        }
    }
}

impl Backoff for FixedBackoff {
    fn next_backoff(&mut self) -> Duration {
        self.delay + jitter(&mut self.rng, self.jitter, self.delay, self.max)
    }
}

/// Returns a random, uniform duration on `[0, base * ratio]`, no greater than
/// `max - base`.
fn jitter(rng: &mut HasherRng, ratio: f64, base: Duration, max: Duration) -> Duration {
    if ratio == 0.0 {
        return Duration::default();
    }

    let rand_jitter = rng.next_f64() * ratio;
    let secs = (base.as_secs() as f64) * rand_jitter;
    let nanos = (base.subsec_nanos() as f64) * rand_jitter;
    let remaining = max.saturating_sub(base);
    Duration::new(secs as u64, nanos as u32).min(remaining)
}
