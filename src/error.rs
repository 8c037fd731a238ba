//! Error types produced by execution policies.
//!
//! Policies return [`BoxError`], so callers inspect failures with
//! `downcast_ref`:
//!
//! ```
//! use execution_policy::{BoxError, CapacityExceeded, Cancelled, RetriesExhausted};
//!
//! fn describe(error: &BoxError) -> &'static str {
//!     if error.is::<Cancelled>() {
//!         "cancelled"
//!     } else if error.is::<CapacityExceeded>() {
//!         "throttled"
//!     } else if error.is::<RetriesExhausted>() {
//!         "gave up"
//!     } else {
//!         "failed"
//!     }
//! }
//! # drop(describe);
//! ```
//!
//! [`Transient`] and [`RateLimited`] are meant to be raised by the code that
//! performs the network call, so the retry policies know which failures are
//! worth another attempt.

use crate::BoxError;
use std::{fmt, time::Duration};

/// Invalid policy options, reported when a policy is constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    field: &'static str,
    constraint: &'static str,
}

/// A request was refused by a leaky bucket without being admitted.
pub struct CapacityExceeded {
    reason: Refusal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Refusal {
    Rejected,
    Dropped,
    Evicted,
    Oversized,
}

/// The caller's cancellation token fired, or the bucket the request waited
/// on was stopped.
pub struct Cancelled {
    stopped: bool,
}

/// Every allowed retry of a unit of work failed.
pub struct RetriesExhausted {
    attempts: u32,
    errors: Vec<BoxError>,
}

/// A transient failure, such as a dropped connection, that may succeed if the
/// request is sent again.
pub struct Transient {
    inner: BoxError,
}

/// The remote API answered with a rate limit response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RateLimited {
    retry_after: Option<Duration>,
}

// ===== impl ConfigurationError =====

impl ConfigurationError {
    pub(crate) const fn new(field: &'static str, constraint: &'static str) -> Self {
        ConfigurationError { field, constraint }
    }

    /// The name of the option that failed validation.
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// The constraint the option violated, e.g. `must be > 0`.
    pub fn constraint(&self) -> &'static str {
        self.constraint
    }
}

impl fmt::Debug for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationError")
            .field("field", &self.field)
            .field("constraint", &self.constraint)
            .finish()
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration: {} {}", self.field, self.constraint)
    }
}

impl std::error::Error for ConfigurationError {}

// ===== impl CapacityExceeded =====

impl CapacityExceeded {
    pub(crate) fn rejected() -> Self {
        CapacityExceeded {
            reason: Refusal::Rejected,
        }
    }

    pub(crate) fn dropped() -> Self {
        CapacityExceeded {
            reason: Refusal::Dropped,
        }
    }

    pub(crate) fn evicted() -> Self {
        CapacityExceeded {
            reason: Refusal::Evicted,
        }
    }

    pub(crate) fn oversized() -> Self {
        CapacityExceeded {
            reason: Refusal::Oversized,
        }
    }

    /// Refused because the bucket rejects requests it cannot admit right away.
    pub fn is_rejected(&self) -> bool {
        self.reason == Refusal::Rejected
    }

    /// Refused because the bucket drops the newest request when it is out of
    /// capacity.
    pub fn is_dropped(&self) -> bool {
        self.reason == Refusal::Dropped
    }

    /// The request was queued, then evicted to make room for a newer one.
    pub fn is_evicted(&self) -> bool {
        self.reason == Refusal::Evicted
    }

    /// The request costs more than the bucket can ever hold.
    pub fn is_oversized(&self) -> bool {
        self.reason == Refusal::Oversized
    }
}

impl fmt::Debug for CapacityExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CapacityExceeded").field(&self.reason).finish()
    }
}

impl fmt::Display for CapacityExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.reason {
            Refusal::Rejected => "request rejected: insufficient capacity",
            Refusal::Dropped => "request dropped: insufficient capacity",
            Refusal::Evicted => "request evicted from the wait queue by a newer request",
            Refusal::Oversized => "request cost exceeds the maximum capacity of the bucket",
        })
    }
}

impl std::error::Error for CapacityExceeded {}

// ===== impl Cancelled =====

impl Cancelled {
    pub(crate) fn new() -> Self {
        Cancelled { stopped: false }
    }

    pub(crate) fn stopped() -> Self {
        Cancelled { stopped: true }
    }

    /// Returns `true` if the request was released because its bucket was
    /// stopped, rather than by the caller's cancellation token.
    pub fn is_bucket_stopped(&self) -> bool {
        self.stopped
    }
}

impl fmt::Debug for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancelled")
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stopped {
            f.write_str("request cancelled: bucket stopped")
        } else {
            f.write_str("request cancelled")
        }
    }
}

impl std::error::Error for Cancelled {}

// ===== impl RetriesExhausted =====

impl RetriesExhausted {
    pub(crate) fn new(attempts: u32, errors: Vec<BoxError>) -> Self {
        debug_assert!(!errors.is_empty(), "exhausted retries without an error");
        RetriesExhausted { attempts, errors }
    }

    /// The number of retries performed after the first attempt.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Every retryable error observed, oldest first.
    pub fn errors(&self) -> &[BoxError] {
        &self.errors
    }

    /// The error returned by the final attempt.
    pub fn last_error(&self) -> Option<&BoxError> {
        self.errors.last()
    }

    /// Consume `self`, returning every error observed.
    pub fn into_errors(self) -> Vec<BoxError> {
        self.errors
    }
}

impl fmt::Debug for RetriesExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetriesExhausted")
            .field("attempts", &self.attempts)
            .field("errors", &self.errors)
            .finish()
    }
}

impl fmt::Display for RetriesExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retries exhausted after {} attempts", self.attempts)?;
        if let Some(last) = self.errors.last() {
            write!(f, ": {}", last)?;
        }
        Ok(())
    }
}

impl std::error::Error for RetriesExhausted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .last()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

// ===== impl Transient =====

impl Transient {
    /// Mark `inner` as a transient failure.
    pub fn new(inner: impl Into<BoxError>) -> Self {
        Transient {
            inner: inner.into(),
        }
    }

    /// Get a reference to the underlying error.
    pub fn get_ref(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.inner
    }

    /// Consume `self`, returning the underlying error.
    pub fn into_inner(self) -> BoxError {
        self.inner
    }
}

impl fmt::Debug for Transient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transient").field(&self.inner).finish()
    }
}

impl fmt::Display for Transient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transient failure: {}", self.inner)
    }
}

impl std::error::Error for Transient {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.inner)
    }
}

// ===== impl RateLimited =====

impl RateLimited {
    /// A rate limit response without a suggested delay.
    pub const fn new() -> Self {
        RateLimited { retry_after: None }
    }

    /// A rate limit response asking the client to wait `delay` before trying
    /// again.
    pub const fn after(delay: Duration) -> Self {
        RateLimited {
            retry_after: Some(delay),
        }
    }

    /// The delay suggested by the remote API, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

impl fmt::Display for RateLimited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.retry_after {
            Some(delay) => write!(f, "rate limited; retry after {:?}", delay),
            None => f.write_str("rate limited"),
        }
    }
}

impl std::error::Error for RateLimited {}
