//! Leaky bucket admission control.
//!
//! A [`LeakyBucket`] tracks an amount of available capacity. Every request
//! declares a cost; a request that fits is admitted right away and its cost is
//! deducted, while a request that does not fit is handled according to the
//! bucket's [`OverflowMode`], by default by queueing it. Capacity is restored
//! continuously at a fixed rate per second, up to a maximum.
//!
//! Queued requests wait in an [`AdmissionQueue`] with two [`Lane`]s. A
//! dedicated [`Worker`] task admits them in order as capacity is restored:
//! first-in first-out within a lane, and the foreground lane always ahead of
//! the background lane.
//!
//! All bucket state lives behind one lock that both callers and the worker go
//! through, so replenishment, admission and eviction never interleave.
//!
//! # Example
//!
//! ```
//! use execution_policy::{LeakyBucket, LeakyBucketOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), execution_policy::BoxError> {
//! let bucket = LeakyBucket::new(LeakyBucketOptions::default())?;
//! let token = CancellationToken::new();
//!
//! bucket.wait_for_availability(1, &token).await?;
//! // ... send the request ...
//! # Ok(())
//! # }
//! ```

mod lane;
mod options;
mod pending;
mod queue;
mod state;
mod worker;

pub use self::{
    lane::{ClassifyLane, Lane, TaskLocalLane},
    options::{LeakyBucketOptions, OverflowMode},
    queue::AdmissionQueue,
    worker::Worker,
};

use self::{
    pending::Rx,
    state::{Decision, State},
};
use crate::{
    error::{Cancelled, ConfigurationError},
    options::PolicyOptions,
    util::Cancellable,
    BoxError,
};
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::{sync::Notify, time::Instant};
use tokio_util::sync::CancellationToken;

/// An admission controller that restores capacity at a fixed rate.
///
/// `LeakyBucket` is cheap to clone; clones share the same capacity and queue.
/// The bucket stops once [`stop`](LeakyBucket::stop) is called or every clone
/// has been dropped.
#[derive(Clone)]
pub struct LeakyBucket {
    handle: Arc<Handle>,
}

/// Stops the bucket when the last `LeakyBucket` clone goes away.
struct Handle {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    notify: Notify,
    classifier: Box<dyn ClassifyLane>,
}

/// Withdraws a queued request if its caller stops waiting before reading the
/// outcome.
struct Queued<'a> {
    shared: &'a Shared,
    id: u64,
    cost: u32,
    rx: Rx,
    armed: bool,
}

// ===== impl LeakyBucket =====

impl LeakyBucket {
    /// Create a bucket and spawn its worker on the current tokio runtime.
    ///
    /// Requests are classified with [`TaskLocalLane`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if `options` is invalid.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime. Use
    /// [`pair`](LeakyBucket::pair) to spawn the worker elsewhere.
    pub fn new(options: LeakyBucketOptions) -> Result<Self, ConfigurationError> {
        Self::with_classifier(options, TaskLocalLane)
    }

    /// Create a bucket that queues requests in the lane picked by
    /// `classifier`, and spawn its worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn with_classifier<C>(
        options: LeakyBucketOptions,
        classifier: C,
    ) -> Result<Self, ConfigurationError>
    where
        C: ClassifyLane,
    {
        let (bucket, worker) = Self::pair_with_classifier(options, classifier)?;
        tokio::spawn(worker);
        Ok(bucket)
    }

    /// Create a bucket and the [`Worker`] that drives it.
    ///
    /// The worker must be spawned for queued requests to ever be admitted.
    pub fn pair(options: LeakyBucketOptions) -> Result<(Self, Worker), ConfigurationError> {
        Self::pair_with_classifier(options, TaskLocalLane)
    }

    /// Like [`pair`](LeakyBucket::pair), with a custom lane classifier.
    pub fn pair_with_classifier<C>(
        options: LeakyBucketOptions,
        classifier: C,
    ) -> Result<(Self, Worker), ConfigurationError>
    where
        C: ClassifyLane,
    {
        options.validate()?;

        let shared = Arc::new(Shared {
            state: Mutex::new(State::new(&options, Instant::now())),
            notify: Notify::new(),
            classifier: Box::new(classifier),
        });
        let worker = Worker::new(shared.clone());
        let bucket = LeakyBucket {
            handle: Arc::new(Handle { shared }),
        };

        Ok((bucket, worker))
    }

    /// Wait until `cost` units of capacity can be taken from the bucket.
    ///
    /// Returns immediately if enough capacity is available. Otherwise the
    /// bucket's [`OverflowMode`] decides whether the request is refused with a
    /// [`CapacityExceeded`] error or queued, in the lane picked by the bucket's
    /// classifier, until the worker admits it.
    ///
    /// A queued request is removed from the queue as soon as `cancel` fires or
    /// the returned future is dropped, and the call fails with [`Cancelled`].
    /// Cancellation wins a race with admission; capacity the worker already
    /// granted to a cancelled request is returned to the bucket.
    /// Stopping the bucket also fails every queued call with [`Cancelled`].
    ///
    /// [`CapacityExceeded`]: crate::error::CapacityExceeded
    pub async fn wait_for_availability(
        &self,
        cost: u32,
        cancel: &CancellationToken,
    ) -> Result<(), BoxError> {
        let lane = self.shared().classifier.classify();
        self.wait_for_availability_in(lane, cost, cancel).await
    }

    /// Like [`wait_for_availability`](LeakyBucket::wait_for_availability),
    /// queueing the request in `lane` regardless of the classifier.
    pub async fn wait_for_availability_in(
        &self,
        lane: Lane,
        cost: u32,
        cancel: &CancellationToken,
    ) -> Result<(), BoxError> {
        if cancel.is_cancelled() {
            return Err(Cancelled::new().into());
        }

        let shared = self.shared();
        let (id, rx) = {
            let mut state = shared.lock();
            match state.try_acquire(cost, lane, cancel, Instant::now()) {
                Decision::Admitted => {
                    tracing::trace!(cost, available = state.available(), "admitted");
                    return Ok(());
                }
                Decision::Refused(error) => {
                    tracing::debug!(cost, %error, "request refused");
                    return Err(error.into());
                }
                Decision::Stopped => return Err(Cancelled::stopped().into()),
                Decision::Queued { id, rx } => (id, rx),
            }
        };
        shared.notify.notify_one();

        let mut queued = Queued {
            shared,
            id,
            cost,
            rx,
            armed: true,
        };

        let outcome = Cancellable::new(&mut queued.rx, cancel).await;
        match outcome {
            Ok(admission) => {
                queued.armed = false;
                // A dropped sender means the request was released without an
                // outcome, which only happens while the bucket shuts down.
                admission.unwrap_or_else(|_| Err(Cancelled::stopped().into()))
            }
            Err(cancelled) => {
                tracing::trace!(id, "queued request cancelled");
                drop(queued);
                Err(cancelled.into())
            }
        }
    }

    /// Change the bucket's parameters at runtime.
    ///
    /// Capacity restored so far is settled under the old rate, then the new
    /// rate and maximum are applied and `capacity_delta` is added to the
    /// available capacity, which is kept within `[0, maximum_capacity]`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`], leaving the bucket unchanged, if
    /// `capacity_delta` is not finite or a new rate or maximum is not
    /// positive.
    pub fn adjust_rate(
        &self,
        capacity_delta: f64,
        restore_rate_per_second: Option<f64>,
        maximum_capacity: Option<f64>,
    ) -> Result<(), ConfigurationError> {
        let shared = self.shared();
        shared.lock().adjust(
            capacity_delta,
            restore_rate_per_second,
            maximum_capacity,
            Instant::now(),
        )?;
        shared.notify.notify_one();
        Ok(())
    }

    /// Stop the bucket.
    ///
    /// Every queued request fails with [`Cancelled`] and every later call
    /// fails the same way. The worker exits.
    pub fn stop(&self) {
        self.shared().stop();
    }

    /// The capacity available right now.
    pub fn available_capacity(&self) -> f64 {
        let mut state = self.shared().lock();
        state.replenish(Instant::now());
        state.available()
    }

    /// The number of requests waiting in the queue.
    pub fn pending_requests(&self) -> usize {
        self.shared().lock().pending()
    }

    /// Returns `true` once the bucket has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.shared().lock().is_stopped()
    }

    fn shared(&self) -> &Shared {
        &self.handle.shared
    }
}

impl fmt::Debug for LeakyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared().lock();
        f.debug_struct("LeakyBucket")
            .field("available", &state.available())
            .field("pending", &state.pending())
            .field("stopped", &state.is_stopped())
            .finish()
    }
}

// ===== impl Shared =====

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop(&self) {
        self.lock().stop();
        self.notify.notify_one();
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let shared = self.shared;
        let mut state = shared.lock();
        if state.remove(self.id) {
            // The removed request may have been the head the worker is
            // sleeping on.
            drop(state);
            shared.notify.notify_one();
        } else if let Ok(Ok(())) = self.rx.try_recv() {
            // The worker admitted the request after the caller gave up.
            tracing::trace!(id = self.id, cost = self.cost, "refunding unclaimed admission");
            state.refund(self.cost, Instant::now());
            drop(state);
            shared.notify.notify_one();
        }
    }
}
