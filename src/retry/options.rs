use super::backoff::{ExponentialBackoffMaker, FixedBackoffMaker};
use crate::{error::ConfigurationError, options::PolicyOptions};
use std::time::Duration;

/// Options for a [`FixedRetryPolicy`](super::FixedRetryPolicy).
#[derive(Clone, Debug, PartialEq)]
pub struct RetryOptions {
    /// How many times a failed unit of work is retried after the first
    /// attempt.
    pub max_attempts: u32,
    /// The delay before every retry.
    pub base_delay: Duration,
    /// Upper bound on a delay once jitter has been added.
    pub max_delay: Duration,
    /// The ratio of `base_delay` that may be randomly added to each delay,
    /// within `[0.0, 1.0]`.
    pub jitter: f64,
}

/// Options for an [`ExponentialRetryPolicy`](super::ExponentialRetryPolicy).
#[derive(Clone, Debug, PartialEq)]
pub struct ExponentialRetryOptions {
    /// How many times a failed unit of work is retried after the first
    /// attempt.
    pub max_attempts: u32,
    /// The delay before the first retry. Each later retry doubles it.
    pub base_delay: Duration,
    /// Upper bound on any delay.
    pub max_delay: Duration,
    /// The ratio of each delay that may be randomly added to it, within
    /// `[0.0, 1.0]`.
    pub jitter: f64,
}

impl RetryOptions {
    pub(crate) fn make_backoff(&self) -> Result<FixedBackoffMaker, ConfigurationError> {
        FixedBackoffMaker::new(self.base_delay, self.max_delay, self.jitter)
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        RetryOptions {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(500),
            jitter: 0.0,
        }
    }
}

impl PolicyOptions for RetryOptions {
    fn validate(&self) -> Result<(), ConfigurationError> {
        self.make_backoff().map(drop)
    }
}

impl ExponentialRetryOptions {
    pub(crate) fn make_backoff(&self) -> Result<ExponentialBackoffMaker, ConfigurationError> {
        ExponentialBackoffMaker::new(self.base_delay, self.max_delay, self.jitter)
    }
}

impl Default for ExponentialRetryOptions {
    fn default() -> Self {
        ExponentialRetryOptions {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: 0.1,
        }
    }
}

impl PolicyOptions for ExponentialRetryOptions {
    fn validate(&self) -> Result<(), ConfigurationError> {
        self.make_backoff().map(drop)
    }
}
