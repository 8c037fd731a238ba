//! The execution policy abstraction.
//!
//! An [`ExecutionPolicy`] executes a *unit of work*, a closure producing the
//! future that performs one network call, and decides how that call is
//! dispatched: right away, after waiting for capacity, or again after a
//! failure.
//!
//! A configured client uses exactly one policy instance. [`Policy`] is the
//! tagged union of the provided policies, built from a [`PolicyConfig`].

mod throttle;

pub use self::throttle::LeakyBucketPolicy;

use crate::{
    bucket::LeakyBucketOptions,
    error::ConfigurationError,
    options::{PolicyOptions, RequiresOptions},
    retry::{ExponentialRetryOptions, ExponentialRetryPolicy, FixedRetryPolicy, RetryOptions},
    util::Cancellable,
    BoxError,
};
use futures_util::future::BoxFuture;
use std::{future::Future, sync::Arc};
use tokio_util::sync::CancellationToken;

/// An operation performing one network call, runnable more than once.
///
/// Retry policies call the same unit of work again for every attempt, so
/// the operation must be idempotent.
///
/// # Closure
///
/// This trait is implemented for every `FnMut() -> Fut + Send` closure whose
/// future resolves to a `Result`.
pub trait UnitOfWork: Send {
    /// The value produced by a successful call.
    type Response: Send;

    /// The error produced by a failed call.
    type Error: Into<BoxError> + Send;

    /// The future performing the call.
    type Future: Future<Output = Result<Self::Response, Self::Error>> + Send;

    /// Start a new attempt.
    fn call(&mut self) -> Self::Future;
}

impl<F, Fut, T, E> UnitOfWork for F
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T, E>> + Send,
    T: Send,
    E: Into<BoxError> + Send,
{
    type Response = T;
    type Error = E;
    type Future = Fut;

    fn call(&mut self) -> Self::Future {
        (self)()
    }
}

/// Governs how a unit of work is dispatched, throttled, retried and failed.
///
/// Policies are shared: any number of callers may execute through the same
/// instance concurrently.
pub trait ExecutionPolicy: Send + Sync {
    /// Execute `work`, honoring this policy.
    ///
    /// `cost` is the caller's estimate of how much rate limit capacity the
    /// call consumes; policies that do not throttle ignore it. Firing `cancel`
    /// abandons any wait, delay or in-flight attempt and fails the call with
    /// [`Cancelled`].
    ///
    /// [`Cancelled`]: crate::error::Cancelled
    fn execute<'a, W>(
        &'a self,
        work: W,
        cost: u32,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<W::Response, BoxError>>
    where
        W: UnitOfWork + 'a;
}

impl<P> ExecutionPolicy for Arc<P>
where
    P: ExecutionPolicy,
{
    fn execute<'a, W>(
        &'a self,
        work: W,
        cost: u32,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<W::Response, BoxError>>
    where
        W: UnitOfWork + 'a,
    {
        (**self).execute(work, cost, cancel)
    }
}

/// Run one attempt of `work`, abandoning it if `cancel` fires.
pub(crate) async fn run_once<W>(
    work: &mut W,
    cancel: &CancellationToken,
) -> Result<W::Response, BoxError>
where
    W: UnitOfWork,
{
    match Cancellable::new(work.call(), cancel).await {
        Ok(result) => result.map_err(Into::into),
        Err(cancelled) => Err(cancelled.into()),
    }
}

/// Runs every unit of work exactly once, with no throttling or retry.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPolicy;

impl DefaultPolicy {
    /// Create a new `DefaultPolicy`.
    pub const fn new() -> Self {
        DefaultPolicy
    }
}

impl ExecutionPolicy for DefaultPolicy {
    fn execute<'a, W>(
        &'a self,
        mut work: W,
        _cost: u32,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<W::Response, BoxError>>
    where
        W: UnitOfWork + 'a,
    {
        Box::pin(async move { run_once(&mut work, cancel).await })
    }
}

/// Configuration selecting one policy variant and its options.
#[derive(Clone, Debug, PartialEq)]
pub enum PolicyConfig {
    /// Build a [`DefaultPolicy`].
    Default,
    /// Build a [`FixedRetryPolicy`].
    Retry(RetryOptions),
    /// Build an [`ExponentialRetryPolicy`].
    ExponentialRetry(ExponentialRetryOptions),
    /// Build a [`LeakyBucketPolicy`].
    LeakyBucket(LeakyBucketOptions),
}

impl PolicyConfig {
    /// Validate the options of the selected variant.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            PolicyConfig::Default => Ok(()),
            PolicyConfig::Retry(options) => options.validate(),
            PolicyConfig::ExponentialRetry(options) => options.validate(),
            PolicyConfig::LeakyBucket(options) => options.validate(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::Default
    }
}

/// One of the provided execution policies.
#[derive(Clone, Debug)]
pub enum Policy {
    /// Runs work once.
    Default(DefaultPolicy),
    /// Retries after a constant delay.
    Retry(FixedRetryPolicy),
    /// Retries after exponentially growing delays.
    ExponentialRetry(ExponentialRetryPolicy),
    /// Admits work through a leaky bucket.
    LeakyBucket(LeakyBucketPolicy),
}

impl Policy {
    /// Build the policy selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the selected options are invalid.
    ///
    /// # Panics
    ///
    /// Building a [`PolicyConfig::LeakyBucket`] spawns the bucket's worker and
    /// panics outside of a tokio runtime.
    pub fn from_config(config: PolicyConfig) -> Result<Self, ConfigurationError> {
        let policy = match config {
            PolicyConfig::Default => Policy::Default(DefaultPolicy),
            PolicyConfig::Retry(options) => Policy::Retry(FixedRetryPolicy::from_options(options)?),
            PolicyConfig::ExponentialRetry(options) => {
                Policy::ExponentialRetry(ExponentialRetryPolicy::from_options(options)?)
            }
            PolicyConfig::LeakyBucket(options) => {
                Policy::LeakyBucket(LeakyBucketPolicy::from_options(options)?)
            }
        };
        Ok(policy)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy::Default(DefaultPolicy)
    }
}

impl From<DefaultPolicy> for Policy {
    fn from(policy: DefaultPolicy) -> Self {
        Policy::Default(policy)
    }
}

impl From<FixedRetryPolicy> for Policy {
    fn from(policy: FixedRetryPolicy) -> Self {
        Policy::Retry(policy)
    }
}

impl From<ExponentialRetryPolicy> for Policy {
    fn from(policy: ExponentialRetryPolicy) -> Self {
        Policy::ExponentialRetry(policy)
    }
}

impl From<LeakyBucketPolicy> for Policy {
    fn from(policy: LeakyBucketPolicy) -> Self {
        Policy::LeakyBucket(policy)
    }
}

impl ExecutionPolicy for Policy {
    fn execute<'a, W>(
        &'a self,
        work: W,
        cost: u32,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<W::Response, BoxError>>
    where
        W: UnitOfWork + 'a,
    {
        match self {
            Policy::Default(policy) => policy.execute(work, cost, cancel),
            Policy::Retry(policy) => policy.execute(work, cost, cancel),
            Policy::ExponentialRetry(policy) => policy.execute(work, cost, cancel),
            Policy::LeakyBucket(policy) => policy.execute(work, cost, cancel),
        }
    }
}
