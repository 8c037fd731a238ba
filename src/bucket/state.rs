use super::{
    pending::{PendingRequest, Rx},
    AdmissionQueue, Lane, LeakyBucketOptions, OverflowMode,
};
use crate::{
    error::{CapacityExceeded, Cancelled, ConfigurationError},
    options::positive,
};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The outcome of an admission attempt.
#[derive(Debug)]
pub(crate) enum Decision {
    Admitted,
    Queued { id: u64, rx: Rx },
    Refused(CapacityExceeded),
    Stopped,
}

/// Everything a bucket mutates, owned behind a single lock.
///
/// Replenishment, admission, eviction and rate adjustment each run as one
/// step against this struct, so the worker and callers never interleave.
#[derive(Debug)]
pub(crate) struct State {
    available: f64,
    maximum: f64,
    restore_rate: f64,
    last_update: Instant,
    overflow: OverflowMode,
    queue: AdmissionQueue<PendingRequest>,
    next_id: u64,
    stopped: bool,
}

impl State {
    pub(crate) fn new(options: &LeakyBucketOptions, now: Instant) -> Self {
        State {
            available: options.initial_capacity,
            maximum: options.maximum_capacity,
            restore_rate: options.restore_rate_per_second,
            last_update: now,
            overflow: options.overflow_mode,
            queue: AdmissionQueue::new(),
            next_id: 0,
            stopped: false,
        }
    }

    pub(crate) fn available(&self) -> f64 {
        self.available
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Restore capacity for the time elapsed since the last update.
    pub(crate) fn replenish(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update);
        let restored = elapsed.as_secs_f64() * self.restore_rate;
        self.available = (self.available + restored).min(self.maximum);
        self.last_update = now;
    }

    pub(crate) fn try_acquire(
        &mut self,
        cost: u32,
        lane: Lane,
        cancel: &CancellationToken,
        now: Instant,
    ) -> Decision {
        if self.stopped {
            return Decision::Stopped;
        }

        let cost_f = f64::from(cost);
        if cost_f > self.maximum {
            return Decision::Refused(CapacityExceeded::oversized());
        }

        self.replenish(now);
        if self.available >= cost_f && !self.has_waiters_ahead(lane) {
            self.available -= cost_f;
            return Decision::Admitted;
        }

        match self.overflow {
            OverflowMode::RejectImmediately => Decision::Refused(CapacityExceeded::rejected()),
            OverflowMode::DropNewest => Decision::Refused(CapacityExceeded::dropped()),
            OverflowMode::DropOldest => {
                if let Some(evicted) = self.queue.pop_oldest(lane) {
                    tracing::debug!(id = evicted.id, ?lane, "evicting oldest queued request");
                    evicted.complete(Err(CapacityExceeded::evicted().into()));
                }
                self.enqueue(cost, lane, cancel)
            }
            OverflowMode::Enqueue => self.enqueue(cost, lane, cancel),
        }
    }

    /// Returns `true` if a request in `lane` would be admitted after some
    /// request that is already queued.
    fn has_waiters_ahead(&self, lane: Lane) -> bool {
        match lane {
            Lane::Foreground => self.queue.lane_len(Lane::Foreground) > 0,
            Lane::Background => !self.queue.is_empty(),
        }
    }

    /// Give back capacity granted to a caller that stopped waiting.
    pub(crate) fn refund(&mut self, cost: u32, now: Instant) {
        self.replenish(now);
        self.available = (self.available + f64::from(cost)).min(self.maximum);
    }

    fn enqueue(&mut self, cost: u32, lane: Lane, cancel: &CancellationToken) -> Decision {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let (request, rx) = PendingRequest::new(id, cost, cancel.clone());
        tracing::trace!(id, cost, ?lane, "queueing request");
        self.queue.enqueue(request, lane);

        Decision::Queued { id, rx }
    }

    /// Remove a queued request whose caller stopped waiting.
    pub(crate) fn remove(&mut self, id: u64) -> bool {
        self.queue.remove_where(|request| request.id == id).is_some()
    }

    /// Admit queued requests, in lane priority order, for as long as the head
    /// of the queue is affordable.
    ///
    /// Returns how long until the new head becomes affordable, or `None` if
    /// the queue is empty.
    pub(crate) fn drain(&mut self, now: Instant) -> Option<Duration> {
        self.replenish(now);

        while let Some(head) = self.queue.peek() {
            let cost = f64::from(head.cost);

            if head.is_abandoned() {
                let _ = self.queue.try_dequeue();
                tracing::trace!("dropping cancelled request");
                continue;
            }

            if cost > self.maximum {
                if let Some(request) = self.queue.try_dequeue() {
                    request.complete(Err(CapacityExceeded::oversized().into()));
                }
                continue;
            }

            if self.available < cost {
                let deficit = cost - self.available;
                let wait = Duration::try_from_secs_f64(deficit / self.restore_rate)
                    .unwrap_or(Duration::MAX);
                return Some(wait);
            }

            if let Some(request) = self.queue.try_dequeue() {
                let id = request.id;
                // Only spend capacity on a caller that is still listening.
                if request.complete(Ok(())) {
                    self.available -= cost;
                    tracing::debug!(id, cost, available = self.available, "admitted queued request");
                } else {
                    tracing::trace!(id, "queued request went away before admission");
                }
            }
        }

        None
    }

    pub(crate) fn adjust(
        &mut self,
        capacity_delta: f64,
        restore_rate: Option<f64>,
        maximum: Option<f64>,
        now: Instant,
    ) -> Result<(), ConfigurationError> {
        if !capacity_delta.is_finite() {
            return Err(ConfigurationError::new("capacity_delta", "must be finite"));
        }
        if let Some(rate) = restore_rate {
            positive("restore_rate_per_second", rate)?;
        }
        if let Some(maximum) = maximum {
            positive("maximum_capacity", maximum)?;
        }

        // Settle what was restored under the old rate first.
        self.replenish(now);

        if let Some(rate) = restore_rate {
            self.restore_rate = rate;
        }
        if let Some(maximum) = maximum {
            self.maximum = maximum;
        }
        self.available = (self.available + capacity_delta).clamp(0.0, self.maximum);

        tracing::debug!(
            available = self.available,
            maximum = self.maximum,
            restore_rate = self.restore_rate,
            "adjusted bucket rate"
        );
        Ok(())
    }

    /// Stop admitting requests and release every queued request.
    pub(crate) fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        let released = self.queue.len();
        for request in self.queue.drain() {
            request.complete(Err(Cancelled::stopped().into()));
        }
        tracing::debug!(released, "bucket stopped");
    }
}
