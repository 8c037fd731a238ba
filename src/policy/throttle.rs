use super::{run_once, ExecutionPolicy, UnitOfWork};
use crate::{
    bucket::{LeakyBucket, LeakyBucketOptions},
    error::ConfigurationError,
    options::RequiresOptions,
    BoxError,
};
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// Admits every unit of work through a [`LeakyBucket`] before running it
/// once.
///
/// The unit of work starts only after its cost has been taken from the
/// bucket. Refusals and cancellations are returned without running it.
#[derive(Clone, Debug)]
pub struct LeakyBucketPolicy {
    bucket: LeakyBucket,
}

impl LeakyBucketPolicy {
    /// Create a policy that admits work through `bucket`.
    pub fn new(bucket: LeakyBucket) -> Self {
        LeakyBucketPolicy { bucket }
    }

    /// Get a reference to the bucket, for example to
    /// [`adjust_rate`](LeakyBucket::adjust_rate) in response to server
    /// feedback.
    pub fn bucket(&self) -> &LeakyBucket {
        &self.bucket
    }
}

impl RequiresOptions for LeakyBucketPolicy {
    type Options = LeakyBucketOptions;

    /// Create the policy and its bucket, spawning the bucket's worker on the
    /// current tokio runtime.
    fn from_options(options: LeakyBucketOptions) -> Result<Self, ConfigurationError> {
        LeakyBucket::new(options).map(LeakyBucketPolicy::new)
    }
}

impl From<LeakyBucket> for LeakyBucketPolicy {
    fn from(bucket: LeakyBucket) -> Self {
        LeakyBucketPolicy::new(bucket)
    }
}

impl ExecutionPolicy for LeakyBucketPolicy {
    fn execute<'a, W>(
        &'a self,
        mut work: W,
        cost: u32,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<W::Response, BoxError>>
    where
        W: UnitOfWork + 'a,
    {
        Box::pin(async move {
            self.bucket.wait_for_availability(cost, cancel).await?;
            run_once(&mut work, cancel).await
        })
    }
}
