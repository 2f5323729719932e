//! Handler contract.
//!
//! A handler inspects or mutates the [`RoutingContext`] and returns exactly
//! one [`Outcome`]. The return value replaces "call next()/fail()" style
//! callbacks, so a handler cannot finish twice or not at all.

use axum::http::StatusCode;
use futures_util::future::{self, BoxFuture};

use crate::routing::context::RoutingContext;

/// Terminal action of a handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Hand the request to the next handler, then to the next matching route.
    Next,
    /// Stop the walk; the context's reply is final.
    Handled,
    /// Abort normal processing and look for failure handlers.
    Fail(StatusCode),
}

/// A stage in a route's handler chain.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut RoutingContext) -> BoxFuture<'a, Outcome>;
}

/// Adapter for synchronous closures.
pub struct FnHandler<F> {
    f: F,
}

/// Wrap a synchronous closure as a [`Handler`].
pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&mut RoutingContext) -> Outcome + Send + Sync + 'static,
{
    FnHandler { f }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut RoutingContext) -> Outcome + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut RoutingContext) -> BoxFuture<'a, Outcome> {
        Box::pin(future::ready((self.f)(ctx)))
    }
}

/// Run a chain until a handler returns something other than `Next`.
pub(crate) async fn run_chain(
    chain: &[std::sync::Arc<dyn Handler>],
    ctx: &mut RoutingContext,
) -> Outcome {
    for handler in chain {
        match handler.call(ctx).await {
            Outcome::Next => continue,
            done => return done,
        }
    }
    Outcome::Next
}
