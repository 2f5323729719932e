//! Route registry and request traversal.
//!
//! # Responsibilities
//! - Register, remove and clear routes while requests are being matched
//! - Walk a snapshot of the routes in `(order, id)` order
//! - Drive handler chains and the switch into failure mode
//! - Delegate to mounted sub-routers under a rebased mount point
//!
//! # Design Decisions
//! - Traversals never lock: they iterate an `Arc` snapshot taken at walk start
//! - Default order is the router's registration sequence, so equal-priority
//!   routes run first-registered-first
//! - A failure restarts from the root router, looking only at failure chains
//! - Not-found and method-not-allowed are outcomes, not errors

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use futures_util::future::BoxFuture;

use crate::routing::context::{MountScope, RoutingContext};
use crate::routing::handler::{run_chain, Handler, Outcome};
use crate::routing::pattern::{validate_mount_point, MatchOptions, Pattern, PatternError};
use crate::routing::route::{Route, RouteBuilder, RouteId};
use crate::routing::store::{CowRouteStore, RouteStore, Snapshot};

/// Final result of dispatching one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler (normal or failure) finished the request.
    Handled,
    /// No route matched and no failure handler claimed the 404.
    NotFound,
    /// A pattern matched but every such route excluded the method.
    MethodNotAllowed,
    /// A handler failed and no failure handler claimed it.
    Unhandled(StatusCode),
}

impl Dispatch {
    /// Status a transport should use when nothing else set one.
    pub fn status(self) -> Option<StatusCode> {
        match self {
            Dispatch::Handled => None,
            Dispatch::NotFound => Some(StatusCode::NOT_FOUND),
            Dispatch::MethodNotAllowed => Some(StatusCode::METHOD_NOT_ALLOWED),
            Dispatch::Unhandled(code) => Some(code),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dispatch::Handled => "handled",
            Dispatch::NotFound => "not_found",
            Dispatch::MethodNotAllowed => "method_not_allowed",
            Dispatch::Unhandled(_) => "unhandled",
        }
    }
}

/// Result of walking a single router level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Walk {
    Handled,
    Exhausted,
    Failed(StatusCode),
}

/// Handle to a registered route, used for removal and toggling.
#[derive(Debug, Clone)]
pub struct RouteHandle {
    route: Arc<Route>,
}

impl RouteHandle {
    pub fn id(&self) -> RouteId {
        self.route.id()
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn enable(&self) {
        self.route.enable();
    }

    pub fn disable(&self) {
        self.route.disable();
    }
}

/// An ordered registry of routes for one mount point.
#[derive(Debug)]
pub struct Router {
    store: Arc<dyn RouteStore>,
    options: MatchOptions,
    next_order: AtomicI32,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::with_options(MatchOptions::default())
    }

    pub fn with_options(options: MatchOptions) -> Self {
        Self::with_store(Arc::new(CowRouteStore::new()), options)
    }

    /// Use a custom [`RouteStore`] implementation.
    pub fn with_store(store: Arc<dyn RouteStore>, options: MatchOptions) -> Self {
        Self {
            store,
            options,
            next_order: AtomicI32::new(0),
        }
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    /// Compile and register a route.
    ///
    /// Compilation errors reject this registration only; the registry is
    /// left exactly as it was.
    pub fn route(&self, builder: RouteBuilder) -> Result<RouteHandle, PatternError> {
        let default_order = self.next_order.fetch_add(1, Ordering::Relaxed);
        let route = Arc::new(builder.build(default_order, self.options)?);

        tracing::debug!(
            route = %route.id(),
            name = route.name().unwrap_or(""),
            order = route.order(),
            patterns = ?route.patterns().iter().map(|p| p.source()).collect::<Vec<_>>(),
            "Route registered"
        );

        self.store.insert(route.clone());
        Ok(RouteHandle { route })
    }

    /// Shorthand for a single-handler route on one path.
    pub fn get(&self, path: &str, handler: impl Handler) -> Result<RouteHandle, PatternError> {
        self.route(
            RouteBuilder::path(path)
                .method(axum::http::Method::GET)
                .handler(handler),
        )
    }

    /// Shorthand for a failure handler on every path.
    pub fn on_failure(&self, handler: impl Handler) -> Result<RouteHandle, PatternError> {
        self.route(RouteBuilder::new().failure_handler(handler))
    }

    /// Mount `router` under the literal `prefix`.
    ///
    /// The sub-router sees request paths with `prefix` stripped and takes
    /// part in both normal and failure walks.
    pub fn mount(&self, prefix: &str, router: Arc<Router>) -> Result<RouteHandle, PatternError> {
        self.mount_with(prefix, router, RouteBuilder::new())
    }

    /// Like [`Router::mount`], with name/order/method settings taken from `builder`.
    pub fn mount_with(
        &self,
        prefix: &str,
        router: Arc<Router>,
        builder: RouteBuilder,
    ) -> Result<RouteHandle, PatternError> {
        validate_mount_point(prefix)?;
        let local = prefix.trim_end_matches('/');
        // Prefixes are stripped case-sensitively, so they must match that way too.
        let entry = Pattern::compile(&format!("{local}/*"))?;
        let mount: Arc<dyn Handler> = Arc::new(Mount {
            prefix: local.into(),
            router,
        });

        self.route(
            builder
                .pattern(entry)
                .without_params()
                .shared_handler(mount.clone())
                .shared_failure_handler(mount),
        )
    }

    /// Unregister a route. Returns `false` if it was not registered here.
    pub fn remove(&self, handle: &RouteHandle) -> bool {
        let removed = self.store.remove(handle.id()).is_some();
        if removed {
            tracing::debug!(route = %handle.id(), "Route removed");
        }
        removed
    }

    pub fn clear(&self) {
        self.store.clear();
        tracing::debug!("Routes cleared");
    }

    /// Point-in-time view of the routes in traversal order.
    pub fn routes(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Dispatch a request through this router as the root registry.
    pub async fn handle(&self, ctx: &mut RoutingContext) -> Dispatch {
        let (code, from_no_match) = match self.walk(ctx).await {
            Walk::Handled => return Dispatch::Handled,
            Walk::Failed(code) => (code, false),
            Walk::Exhausted if ctx.method_mismatch() => (StatusCode::METHOD_NOT_ALLOWED, true),
            Walk::Exhausted => (StatusCode::NOT_FOUND, true),
        };

        tracing::debug!(
            path = ctx.path(),
            status = code.as_u16(),
            "Entering failure mode"
        );
        ctx.enter_failure(code);

        match self.walk(ctx).await {
            Walk::Handled => Dispatch::Handled,
            Walk::Exhausted | Walk::Failed(_) => {
                let outcome = match code {
                    StatusCode::NOT_FOUND if from_no_match => Dispatch::NotFound,
                    StatusCode::METHOD_NOT_ALLOWED if from_no_match => Dispatch::MethodNotAllowed,
                    _ => Dispatch::Unhandled(code),
                };
                tracing::debug!(path = ctx.path(), outcome = outcome.as_str(), "No failure handler claimed request");
                outcome
            }
        }
    }

    /// Walk this router's routes once, in the context's current mode.
    pub(crate) async fn walk(&self, ctx: &mut RoutingContext) -> Walk {
        let snapshot = self.store.snapshot();
        let mount_point = ctx.mount_point_arc();
        let mount_point = mount_point.as_deref().unwrap_or("");
        let failure = ctx.is_failure();

        for route in snapshot.iter() {
            if !route.matches(ctx, mount_point, failure) {
                continue;
            }

            tracing::trace!(route = %route.id(), failure, "Route matched");
            ctx.record_visit(route.id());

            let chain = if failure {
                route.failure_handlers()
            } else {
                route.handlers()
            };
            match run_chain(chain, ctx).await {
                Outcome::Next => continue,
                Outcome::Handled => return Walk::Handled,
                Outcome::Fail(code) => return Walk::Failed(code),
            }
        }

        Walk::Exhausted
    }
}

/// Handler that delegates to a sub-router.
struct Mount {
    prefix: Arc<str>,
    router: Arc<Router>,
}

impl Handler for Mount {
    fn call<'a>(&'a self, ctx: &'a mut RoutingContext) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let mut scope = MountScope::enter(ctx, &self.prefix);
            match self.router.walk(&mut scope).await {
                Walk::Handled => Outcome::Handled,
                Walk::Exhausted => Outcome::Next,
                Walk::Failed(code) => Outcome::Fail(code),
            }
        })
    }
}
