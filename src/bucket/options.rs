use crate::{
    error::ConfigurationError,
    options::{finite_non_negative, positive, PolicyOptions},
};

/// What a [`LeakyBucket`] does with a request it cannot admit right away.
///
/// [`LeakyBucket`]: super::LeakyBucket
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowMode {
    /// Queue the request until enough capacity has been restored.
    Enqueue,
    /// Refuse the incoming request, leaving the queue untouched.
    DropNewest,
    /// Evict the oldest queued request in the incoming request's lane, then
    /// queue the incoming request.
    DropOldest,
    /// Refuse the incoming request without considering the queue.
    RejectImmediately,
}

impl Default for OverflowMode {
    fn default() -> Self {
        OverflowMode::Enqueue
    }
}

/// Options for a [`LeakyBucket`].
///
/// The defaults match a standard REST API bucket: 40 requests of capacity,
/// restored at 2 per second, starting full.
///
/// [`LeakyBucket`]: super::LeakyBucket
#[derive(Clone, Debug, PartialEq)]
pub struct LeakyBucketOptions {
    /// Capacity available when the bucket is created.
    pub initial_capacity: f64,
    /// Upper bound on the available capacity.
    pub maximum_capacity: f64,
    /// Capacity restored per elapsed second.
    pub restore_rate_per_second: f64,
    /// Behavior when a request costs more than is currently available.
    pub overflow_mode: OverflowMode,
}

impl Default for LeakyBucketOptions {
    fn default() -> Self {
        LeakyBucketOptions {
            initial_capacity: 40.0,
            maximum_capacity: 40.0,
            restore_rate_per_second: 2.0,
            overflow_mode: OverflowMode::Enqueue,
        }
    }
}

impl PolicyOptions for LeakyBucketOptions {
    fn validate(&self) -> Result<(), ConfigurationError> {
        finite_non_negative("initial_capacity", self.initial_capacity)?;
        positive("maximum_capacity", self.maximum_capacity)?;
        positive("restore_rate_per_second", self.restore_rate_per_second)?;
        if self.initial_capacity > self.maximum_capacity {
            return Err(ConfigurationError::new(
                "initial_capacity",
                "must not exceed maximum_capacity",
            ));
        }
        Ok(())
    }
}
