use std::future::Future;
use tokio::task::futures::TaskLocalFuture;

tokio::task_local! {
    static CURRENT_LANE: Lane;
}

/// A priority partition of the admission wait queue.
///
/// Queued foreground requests are always admitted before queued background
/// requests, regardless of arrival order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Work a user is waiting on.
    Foreground,
    /// Work nobody is actively waiting on, such as syncs and batch jobs.
    Background,
}

impl Lane {
    /// Run `future` with `self` as the current lane.
    ///
    /// Buckets using the default classifier queue every request made inside
    /// `future` in this lane.
    ///
    /// ```
    /// use execution_policy::Lane;
    ///
    /// # async fn sync_catalog() {}
    /// # async fn run() {
    /// Lane::Background.scope(sync_catalog()).await;
    /// # }
    /// ```
    pub fn scope<F: Future>(self, future: F) -> TaskLocalFuture<Lane, F> {
        CURRENT_LANE.scope(self, future)
    }

    /// The lane set by an enclosing [`Lane::scope`], or
    /// [`Lane::Foreground`] when there is none.
    pub fn current() -> Lane {
        CURRENT_LANE.try_with(|lane| *lane).unwrap_or_default()
    }
}

impl Default for Lane {
    fn default() -> Self {
        Lane::Foreground
    }
}

/// Picks the lane a request is queued in.
///
/// # Closure
///
/// This trait provides a blanket implementation for closures of the type
/// `Fn() -> Lane + Send + Sync + 'static`.
pub trait ClassifyLane: Send + Sync + 'static {
    /// The lane for a request that is about to be queued.
    fn classify(&self) -> Lane;
}

impl<F> ClassifyLane for F
where
    F: Fn() -> Lane + Send + Sync + 'static,
{
    fn classify(&self) -> Lane {
        (self)()
    }
}

/// The default [`ClassifyLane`], reading [`Lane::current`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TaskLocalLane;

impl ClassifyLane for TaskLocalLane {
    fn classify(&self) -> Lane {
        Lane::current()
    }
}
