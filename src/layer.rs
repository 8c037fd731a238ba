//! Run a [`Service`] through an [`ExecutionPolicy`].
//!
//! [`ExecutionPolicyLayer`] wraps a service so that every request it receives
//! becomes a unit of work for the policy: throttled by a bucket, retried after
//! transient failures, or simply run once.
//!
//! The first attempt is sent to the service readied by `poll_ready`. Every
//! retry clones the inner service and the request, waits for the clone to
//! become ready and then calls it, so a retried request is sent exactly as the
//! first one was.

use crate::{policy::ExecutionPolicy, BoxError};
use futures_util::future::{self, BoxFuture};
use std::{
    fmt, mem,
    sync::Arc,
    task::{Context, Poll},
};
use tokio_util::sync::CancellationToken;
use tower_layer::Layer;
use tower_service::Service;

/// Estimates the rate limit cost of a request.
///
/// # Closure
///
/// This trait provides a blanket implementation for closures of the type
/// `Fn(&Request) -> u32`.
pub trait RequestCost<Request> {
    /// The cost of sending `request`.
    fn cost(&self, request: &Request) -> u32;
}

impl<F, Request> RequestCost<Request> for F
where
    F: Fn(&Request) -> u32,
{
    fn cost(&self, request: &Request) -> u32 {
        (self)(request)
    }
}

/// Every request costs one unit of capacity.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnitCost;

impl<Request> RequestCost<Request> for UnitCost {
    fn cost(&self, _: &Request) -> u32 {
        1
    }
}

/// Applies an [`ExecutionPolicy`] to requests via the supplied inner service.
pub struct ExecutionPolicyLayer<P, C = UnitCost> {
    policy: Arc<P>,
    cost: C,
}

/// Runs every request through an [`ExecutionPolicy`].
///
/// Created by [`ExecutionPolicyLayer`].
pub struct Execute<P, S, C = UnitCost> {
    policy: Arc<P>,
    inner: S,
    cost: C,
}

// ===== impl ExecutionPolicyLayer =====

impl<P> ExecutionPolicyLayer<P> {
    /// Create a layer that charges every request a cost of one.
    pub fn new(policy: P) -> Self {
        ExecutionPolicyLayer {
            policy: Arc::new(policy),
            cost: UnitCost,
        }
    }
}

impl<P, C> ExecutionPolicyLayer<P, C> {
    /// Charge requests the cost computed by `cost`.
    pub fn with_cost<C2>(self, cost: C2) -> ExecutionPolicyLayer<P, C2> {
        ExecutionPolicyLayer {
            policy: self.policy,
            cost,
        }
    }
}

impl<P, S, C> Layer<S> for ExecutionPolicyLayer<P, C>
where
    C: Clone,
{
    type Service = Execute<P, S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        Execute {
            policy: self.policy.clone(),
            inner,
            cost: self.cost.clone(),
        }
    }
}

impl<P, C: Clone> Clone for ExecutionPolicyLayer<P, C> {
    fn clone(&self) -> Self {
        ExecutionPolicyLayer {
            policy: self.policy.clone(),
            cost: self.cost.clone(),
        }
    }
}

impl<P: fmt::Debug, C: fmt::Debug> fmt::Debug for ExecutionPolicyLayer<P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPolicyLayer")
            .field("policy", &self.policy)
            .field("cost", &self.cost)
            .finish()
    }
}

// ===== impl Execute =====

impl<P, S, C> Execute<P, S, C> {
    /// Get a reference to the policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Get a reference to the inner service
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the inner service
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume `self`, returning the inner service
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<P, S, C, Request> Service<Request> for Execute<P, S, C>
where
    P: ExecutionPolicy + 'static,
    S: Service<Request> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Into<BoxError> + Send + 'static,
    S::Future: Send + 'static,
    C: RequestCost<Request>,
    Request: Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<S::Response, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let cost = self.cost.cost(&request);
        let policy = self.policy.clone();

        // Take the service that was driven to readiness, leaving a clone in
        // its place.
        let clone = self.inner.clone();
        let mut ready = Some(mem::replace(&mut self.inner, clone));
        let inner = self.inner.clone();

        let work = move || {
            let request = request.clone();
            let (mut service, is_ready) = match ready.take() {
                Some(service) => (service, true),
                None => (inner.clone(), false),
            };
            async move {
                if !is_ready {
                    future::poll_fn(|cx| service.poll_ready(cx)).await?;
                }
                service.call(request).await
            }
        };

        Box::pin(async move {
            // Dropping the response future abandons the call, so the token
            // only ever scopes this one request.
            let cancel = CancellationToken::new();
            policy.execute(work, cost, &cancel).await
        })
    }
}

impl<P, S: Clone, C: Clone> Clone for Execute<P, S, C> {
    fn clone(&self) -> Self {
        Execute {
            policy: self.policy.clone(),
            inner: self.inner.clone(),
            cost: self.cost.clone(),
        }
    }
}

impl<P, S, C> fmt::Debug for Execute<P, S, C>
where
    P: fmt::Debug,
    S: fmt::Debug,
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execute")
            .field("policy", &self.policy)
            .field("inner", &self.inner)
            .field("cost", &self.cost)
            .finish()
    }
}
