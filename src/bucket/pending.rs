use crate::BoxError;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Outcome delivered to a queued caller.
pub(crate) type Admission = Result<(), BoxError>;

/// Completion sender
pub(crate) type Tx = oneshot::Sender<Admission>;

/// Completion receiver
pub(crate) type Rx = oneshot::Receiver<Admission>;

/// A request waiting in the admission queue.
///
/// The completion signal is released exactly once: when the request is
/// admitted, evicted, or the bucket stops. A request whose caller went away is
/// removed without being signaled.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub(crate) id: u64,
    pub(crate) cost: u32,
    pub(crate) cancel: CancellationToken,
    pub(crate) tx: Tx,
    pub(crate) span: tracing::Span,
}

impl PendingRequest {
    pub(crate) fn new(id: u64, cost: u32, cancel: CancellationToken) -> (PendingRequest, Rx) {
        let (tx, rx) = oneshot::channel();
        let request = PendingRequest {
            id,
            cost,
            cancel,
            tx,
            span: tracing::Span::current(),
        };
        (request, rx)
    }

    /// Returns `true` if nobody is waiting on this request anymore.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Signal the waiting caller, returning `false` if it already went away.
    pub(crate) fn complete(self, admission: Admission) -> bool {
        let _guard = self.span.enter();
        self.tx.send(admission).is_ok()
    }
}
