use crate::error::Cancelled;
use pin_project_lite::pin_project;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

pin_project! {
    /// Races a future against a [`CancellationToken`].
    ///
    /// The token is checked first, so a token that has already fired wins
    /// even if the inner future is also ready.
    #[derive(Debug)]
    pub(crate) struct Cancellable<'a, F> {
        #[pin]
        future: F,
        #[pin]
        cancelled: WaitForCancellationFuture<'a>,
    }
}

impl<'a, F> Cancellable<'a, F> {
    pub(crate) fn new(future: F, token: &'a CancellationToken) -> Self {
        Cancellable {
            future,
            cancelled: token.cancelled(),
        }
    }
}

impl<F> Future for Cancellable<'_, F>
where
    F: Future,
{
    type Output = Result<F::Output, Cancelled>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        // Check the token first.
        if this.cancelled.poll(cx).is_ready() {
            return Poll::Ready(Err(Cancelled::new()));
        }

        this.future.poll(cx).map(Ok)
    }
}
