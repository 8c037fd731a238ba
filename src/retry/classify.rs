use crate::{
    error::{RateLimited, Transient},
    BoxError,
};
use std::{error::Error, io, iter, time::Duration};

/// Decides whether a failed unit of work is worth retrying.
///
/// Errors that are not retryable are returned to the caller as-is, without
/// consuming a retry.
///
/// # Closure
///
/// This trait provides a blanket implementation for closures of the type
/// `Fn(&BoxError) -> bool + Send + Sync + 'static`.
pub trait IsRetryable: Send + Sync + 'static {
    /// Return `true` if the unit of work that failed with `error` should be
    /// retried.
    fn is_retryable(&self, error: &BoxError) -> bool;
}

impl<F> IsRetryable for F
where
    F: Fn(&BoxError) -> bool + Send + Sync + 'static,
{
    fn is_retryable(&self, error: &BoxError) -> bool {
        (self)(error)
    }
}

/// Retries transient network failures and rate limit responses.
///
/// An error is retryable if it, or any error in its [`source`] chain, is:
///
/// - a [`Transient`] failure,
/// - a [`RateLimited`] response,
/// - an [`io::Error`] signalling a broken or timed out connection,
/// - a [`tokio::time::error::Elapsed`] timeout.
///
/// Anything else, including validation errors, is fatal.
///
/// [`source`]: std::error::Error::source
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRetryable;

impl IsRetryable for DefaultRetryable {
    fn is_retryable(&self, error: &BoxError) -> bool {
        chain(error).any(is_transient)
    }
}

fn is_transient(error: &(dyn Error + 'static)) -> bool {
    if error.is::<Transient>() || error.is::<RateLimited>() {
        return true;
    }
    if error.is::<tokio::time::error::Elapsed>() {
        return true;
    }
    match error.downcast_ref::<io::Error>() {
        Some(io) => matches!(
            io.kind(),
            io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::TimedOut
                | io::ErrorKind::Interrupted
                | io::ErrorKind::UnexpectedEof
        ),
        None => false,
    }
}

/// The delay requested by a [`RateLimited`] error in `error`'s chain.
pub(crate) fn retry_after(error: &BoxError) -> Option<Duration> {
    chain(error)
        .find_map(|e| e.downcast_ref::<RateLimited>())
        .and_then(RateLimited::retry_after)
}

fn chain(error: &BoxError) -> impl Iterator<Item = &(dyn Error + 'static)> {
    iter::successors(Some(&**error as &(dyn Error + 'static)), |e| (*e).source())
}
