//! Policies for retrying failed units of work.
//!
//! A [`RetryPolicy`] runs a unit of work and, when it fails with an error the
//! policy's [`IsRetryable`] classifier accepts, waits for the next delay of
//! its [`Backoff`] and runs the **same** unit of work again. Fatal errors are
//! returned immediately without consuming a retry. Once every allowed retry has
//! failed, the caller receives a [`RetriesExhausted`] error holding every
//! failure in order.
//!
//! # Idempotency
//!
//! Nothing done by a failed attempt is rolled back before the next attempt.
//! Only wrap units of work that are safe to run more than once.
//!
//! # Example
//!
//! ```
//! use execution_policy::{
//!     ExecutionPolicy, FixedRetryPolicy, RequiresOptions, RetryOptions, Transient,
//! };
//! use tokio_util::sync::CancellationToken;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let policy = FixedRetryPolicy::from_options(RetryOptions {
//!     max_attempts: 2,
//!     base_delay: Duration::from_millis(1),
//!     max_delay: Duration::from_millis(1),
//!     jitter: 0.0,
//! })
//! .unwrap();
//!
//! let token = CancellationToken::new();
//! let mut calls = 0;
//! let response = policy
//!     .execute(
//!         || {
//!             calls += 1;
//!             let attempt = calls;
//!             async move {
//!                 if attempt < 2 {
//!                     Err(Transient::new("connection reset"))
//!                 } else {
//!                     Ok("done")
//!                 }
//!             }
//!         },
//!         1,
//!         &token,
//!     )
//!     .await
//!     .unwrap();
//!
//! assert_eq!(response, "done");
//! # }
//! ```
//!
//! [`Backoff`]: backoff::Backoff
//! [`RetriesExhausted`]: crate::error::RetriesExhausted

pub mod backoff;
mod classify;
mod options;

pub use self::{
    classify::{DefaultRetryable, IsRetryable},
    options::{ExponentialRetryOptions, RetryOptions},
};

use self::{
    backoff::{Backoff, ExponentialBackoffMaker, FixedBackoffMaker, MakeBackoff},
    classify::retry_after,
};
use crate::{
    error::{Cancelled, ConfigurationError, RetriesExhausted},
    options::{PolicyOptions, RequiresOptions},
    policy::{run_once, ExecutionPolicy, UnitOfWork},
    util::Cancellable,
    BoxError,
};
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// Retries failed units of work, waiting between attempts according to a
/// [`MakeBackoff`].
///
/// The policy holds no per-call state, so one instance may be shared by any
/// number of concurrent callers.
#[derive(Clone, Debug)]
pub struct RetryPolicy<B, C = DefaultRetryable> {
    max_attempts: u32,
    make_backoff: B,
    classifier: C,
}

/// Retries after a constant delay.
pub type FixedRetryPolicy<C = DefaultRetryable> = RetryPolicy<FixedBackoffMaker, C>;

/// Retries after exponentially growing delays.
pub type ExponentialRetryPolicy<C = DefaultRetryable> = RetryPolicy<ExponentialBackoffMaker, C>;

// ===== impl RetryPolicy =====

impl<B> RetryPolicy<B> {
    /// Create a policy that retries at most `max_attempts` times, waiting
    /// according to `make_backoff`, and classifies errors with
    /// [`DefaultRetryable`].
    pub fn new(max_attempts: u32, make_backoff: B) -> Self {
        RetryPolicy {
            max_attempts,
            make_backoff,
            classifier: DefaultRetryable,
        }
    }
}

impl<B, C> RetryPolicy<B, C> {
    /// Replace the error classifier.
    pub fn with_classifier<C2>(self, classifier: C2) -> RetryPolicy<B, C2>
    where
        C2: IsRetryable,
    {
        RetryPolicy {
            max_attempts: self.max_attempts,
            make_backoff: self.make_backoff,
            classifier,
        }
    }

    /// The number of retries allowed after the first attempt.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Get a reference to the backoff maker.
    pub fn backoff(&self) -> &B {
        &self.make_backoff
    }
}

impl RequiresOptions for FixedRetryPolicy {
    type Options = RetryOptions;

    fn from_options(options: RetryOptions) -> Result<Self, ConfigurationError> {
        options.validate()?;
        Ok(RetryPolicy::new(options.max_attempts, options.make_backoff()?))
    }
}

impl RequiresOptions for ExponentialRetryPolicy {
    type Options = ExponentialRetryOptions;

    fn from_options(options: ExponentialRetryOptions) -> Result<Self, ConfigurationError> {
        options.validate()?;
        Ok(RetryPolicy::new(options.max_attempts, options.make_backoff()?))
    }
}

impl<B, C> ExecutionPolicy for RetryPolicy<B, C>
where
    B: MakeBackoff + Send + Sync,
    B::Backoff: Send,
    C: IsRetryable,
{
    fn execute<'a, W>(
        &'a self,
        mut work: W,
        _cost: u32,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<W::Response, BoxError>>
    where
        W: UnitOfWork + 'a,
    {
        Box::pin(async move {
            let mut backoff = self.make_backoff.make_backoff();
            let mut errors: Vec<BoxError> = Vec::new();

            loop {
                let error = match run_once(&mut work, cancel).await {
                    Ok(response) => return Ok(response),
                    Err(error) => error,
                };

                if error.is::<Cancelled>() || !self.classifier.is_retryable(&error) {
                    tracing::trace!(%error, "not retrying fatal error");
                    return Err(error);
                }

                let retries = errors.len() as u32;
                let requested = retry_after(&error);
                errors.push(error);

                if retries >= self.max_attempts {
                    tracing::debug!(attempts = retries, "retries exhausted");
                    return Err(RetriesExhausted::new(retries, errors).into());
                }

                let mut delay = backoff.next_backoff();
                if let Some(after) = requested {
                    delay = delay.max(after);
                }

                tracing::debug!(attempt = retries + 1, ?delay, "retrying after backoff");
                Cancellable::new(tokio::time::sleep(delay), cancel).await?;
            }
        })
    }
}
