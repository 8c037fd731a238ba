#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub
)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(test, allow(clippy::float_cmp))]

//! Policies governing how an outbound API call is dispatched, throttled,
//! retried and failed.
//!
//! Every request an API client makes goes through exactly one
//! [`ExecutionPolicy`]. The policy receives a *unit of work* (the closure that
//! performs the actual network call), an estimated cost, and a
//! [`CancellationToken`] owned by the caller, and decides whether the work runs
//! right away, waits for capacity, or is retried after a failure.
//!
//! The policies provided are:
//!
//! - [`DefaultPolicy`]: runs the unit of work once, no throttling or retry.
//! - [`FixedRetryPolicy`]: retries transient failures after a constant delay.
//! - [`ExponentialRetryPolicy`]: retries transient failures with
//!   exponentially growing, optionally jittered, delays.
//! - [`LeakyBucketPolicy`]: admits work through a [`LeakyBucket`], an
//!   admission controller whose capacity drains on use and replenishes over
//!   time, queueing callers in a two lane (foreground/background) wait queue.
//!
//! Policies are never stacked implicitly. Retrying around a throttle is a
//! decision made by the caller, by nesting one `execute` call inside the unit
//! of work of another.
//!
//! # Configuration
//!
//! Each policy declares the options type it needs through
//! [`RequiresOptions`]. Options are validated when the policy is built, so an
//! invalid configuration is reported as a [`ConfigurationError`] up front and
//! never at call time.
//!
//! ```
//! use execution_policy::{ExponentialRetryOptions, ExponentialRetryPolicy, RequiresOptions};
//! use std::time::Duration;
//!
//! let options = ExponentialRetryOptions {
//!     max_attempts: 3,
//!     base_delay: Duration::from_millis(100),
//!     max_delay: Duration::from_secs(1),
//!     jitter: 0.0,
//! };
//!
//! let policy = ExponentialRetryPolicy::from_options(options).unwrap();
//! # drop(policy);
//! ```
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod bucket;
pub mod error;
pub mod layer;
pub mod options;
pub mod policy;
pub mod retry;

mod util;

#[doc(inline)]
pub use crate::{
    bucket::{Lane, LeakyBucket, LeakyBucketOptions, OverflowMode},
    error::{
        CapacityExceeded, Cancelled, ConfigurationError, RateLimited, RetriesExhausted, Transient,
    },
    layer::{Execute, ExecutionPolicyLayer},
    options::{PolicyOptions, RequiresOptions},
    policy::{
        DefaultPolicy, ExecutionPolicy, LeakyBucketPolicy, Policy, PolicyConfig, UnitOfWork,
    },
    retry::{
        ExponentialRetryOptions, ExponentialRetryPolicy, FixedRetryPolicy, RetryOptions,
        RetryPolicy,
    },
};

/// Alias for a type-erased error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
