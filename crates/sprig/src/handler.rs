//! Handlers and middleware.
//!
//! Middleware and route handlers share one trait: [`Handler`] receives the request context and a [`Next`] that
//! runs the rest of the chain. A middleware calls `next.run(ctx)` somewhere in its body and may look at or replace
//! the response it gets back. A route handler usually ignores `next` and answers on its own.

use crate::body::ResponseBody;
use crate::chain::Next;
use crate::context::RequestContext;
use crate::error::BoxError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use http::Response;
use std::fmt;
use std::sync::Arc;

pub type ResponseResult = Result<Response<ResponseBody>, BoxError>;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &mut RequestContext, next: Next<'_>) -> ResponseResult;
}

pub(crate) type BoxedHandler = Arc<dyn Handler>;

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn call(&self, ctx: &mut RequestContext, next: Next<'_>) -> ResponseResult {
        (**self).call(ctx, next).await
    }
}

/// A closure that takes part in the chain, see [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Wraps a closure that may call `next`, typically a middleware.
///
/// ```
/// use sprig::handler_fn;
///
/// let timing = handler_fn(|ctx, next| {
///     Box::pin(async move {
///         let started = std::time::Instant::now();
///         let response = next.run(ctx).await;
///         tracing::info!(elapsed = ?started.elapsed(), "request handled");
///         response
///     })
/// });
/// # let _ = timing;
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, ResponseResult> + Send + Sync,
{
    FnHandler { f }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, ResponseResult> + Send + Sync,
{
    async fn call(&self, ctx: &mut RequestContext, next: Next<'_>) -> ResponseResult {
        (self.f)(ctx, next).await
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

/// A closure that always answers and never calls `next`, see [`endpoint_fn`].
pub struct EndpointFn<F> {
    f: F,
}

/// Wraps a closure that produces the response itself, typically the last handler of a route.
///
/// ```
/// use sprig::endpoint_fn;
///
/// let hello = endpoint_fn(|ctx| Box::pin(async move { ctx.text("hello") }));
/// # let _ = hello;
/// ```
pub fn endpoint_fn<F>(f: F) -> EndpointFn<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, ResponseResult> + Send + Sync,
{
    EndpointFn { f }
}

#[async_trait]
impl<F> Handler for EndpointFn<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, ResponseResult> + Send + Sync,
{
    async fn call(&self, ctx: &mut RequestContext, _next: Next<'_>) -> ResponseResult {
        (self.f)(ctx).await
    }
}

impl<F> fmt::Debug for EndpointFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EndpointFn")
    }
}
