use super::Shared;
use futures_util::future::{self, BoxFuture};
use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::time::Instant;

/// Task that replenishes a bucket and admits its queued requests. This type
/// should not be used directly: [`LeakyBucket::new`] spawns it, and
/// [`LeakyBucket::pair`] hands it to callers that run their own executor.
///
/// The worker sleeps until the head of the queue becomes affordable, or until
/// it is notified of a new request, a rate adjustment, or a stop. It completes
/// once the bucket is stopped.
///
/// [`LeakyBucket::new`]: super::LeakyBucket::new
/// [`LeakyBucket::pair`]: super::LeakyBucket::pair
pub struct Worker {
    inner: BoxFuture<'static, ()>,
}

impl Worker {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Worker {
            inner: Box::pin(run(shared)),
        }
    }
}

async fn run(shared: Arc<Shared>) {
    loop {
        let wait = {
            let mut state = shared.lock();
            if state.is_stopped() {
                tracing::trace!("bucket stopped; worker exiting");
                return;
            }
            state.drain(Instant::now())
        };

        let notified = shared.notify.notified();
        futures_util::pin_mut!(notified);

        match wait {
            Some(delay) => {
                tracing::trace!(?delay, "waiting for capacity");
                let sleep = tokio::time::sleep(delay);
                futures_util::pin_mut!(sleep);
                future::select(sleep, notified).await;
            }
            None => {
                tracing::trace!("queue empty; waiting for requests");
                notified.await;
            }
        }
    }
}

impl Future for Worker {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").finish()
    }
}
