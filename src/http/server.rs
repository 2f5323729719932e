//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum app with a single fallback into the route registry
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Swap in a freshly built router on config reload
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Router as AxumRouter,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::actions::{build_router, BuildError};
use crate::http::request::{propagate_request_id_layer, routing_context, set_request_id_layer};
use crate::http::response::render;
use crate::observability::metrics;
use crate::routing::Router;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ArcSwap<Router>>,
}

/// HTTP server fronting the route registry.
pub struct HttpServer {
    state: AppState,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server, building its router from `config`.
    pub fn new(config: ServerConfig) -> Result<Self, BuildError> {
        let router = build_router(&config)?;
        Ok(Self::with_router(config, router))
    }

    /// Serve an already assembled router.
    pub fn with_router(config: ServerConfig, router: Router) -> Self {
        Self {
            state: AppState {
                router: Arc::new(ArcSwap::from_pointee(router)),
            },
            config,
        }
    }

    /// Shared handle to the live router.
    pub fn router(&self) -> Arc<ArcSwap<Router>> {
        self.state.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the axum app with all middleware layers.
    #[allow(deprecated)]
    pub fn app(&self) -> AxumRouter {
        AxumRouter::new()
            .fallback(dispatch_handler)
            .with_state(self.state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.timeouts.request_secs,
            )))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires, applying configs received on
    /// `config_updates` as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.state.router.load().len(), "HTTP server starting");

        let live = self.state.router.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                apply_config(&live, &config);
            }
        });

        let app = self.app();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                // A closed channel also means shutdown.
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        result
    }
}

/// Build a router from `config` and publish it; keeps the current router on error.
pub fn apply_config(live: &ArcSwap<Router>, config: &ServerConfig) -> bool {
    match build_router(config) {
        Ok(router) => {
            let routes = router.len();
            live.store(Arc::new(router));
            metrics::record_reload(true);
            tracing::info!(routes, "Routes reloaded");
            true
        }
        Err(e) => {
            metrics::record_reload(false);
            tracing::warn!(error = %e, "Rejected new config, keeping current routes");
            false
        }
    }
}

/// Fallback handler: every request goes through the route registry.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, _body) = request.into_parts();
    let mut ctx = routing_context(&parts);

    // Requests in flight keep the router they started with.
    let router = state.router.load_full();
    let dispatch = router.handle(&mut ctx).await;

    tracing::debug!(
        request_id = ctx.request_id().unwrap_or("unknown"),
        method = %ctx.method(),
        path = ctx.path(),
        outcome = dispatch.as_str(),
        visited = ctx.visited().len(),
        "Request dispatched"
    );
    metrics::record_dispatch(dispatch, start);

    render(dispatch, ctx.take_reply())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{from_fn, Outcome};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_fallback_dispatches_through_router() {
        let router = Router::new();
        router
            .get("/hello/:name", from_fn(|ctx| {
                let body = format!("hello {}", ctx.param("name").unwrap_or("?"));
                ctx.respond(StatusCode::OK, body);
                Outcome::Handled
            }))
            .unwrap();
        let server = HttpServer::with_router(ServerConfig::default(), router);

        let response = server
            .app()
            .oneshot(Request::get("/hello/ana").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello ana");

        let response = server
            .app()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_apply_config_keeps_router_on_error() {
        let server = HttpServer::new(ServerConfig::default()).unwrap();
        let live = server.router();
        assert!(live.load().is_empty());

        let good: ServerConfig = toml::from_str(
            r#"
            [[routes]]
            path = "/a"
            action = { type = "params" }
            "#,
        )
        .unwrap();
        assert!(apply_config(&live, &good));
        assert_eq!(live.load().len(), 1);

        let bad: ServerConfig = toml::from_str(
            r#"
            [[routes]]
            path = "no-slash"
            action = { type = "params" }
            "#,
        )
        .unwrap();
        assert!(!apply_config(&live, &bad));
        assert_eq!(live.load().len(), 1);
    }
}
