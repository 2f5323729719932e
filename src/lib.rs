//! Ordered route registry and request dispatcher.
//!
//! Routes pair path patterns (static, templated, regex) with handler
//! chains. A `Router` walks them in `(order, id)` order, hands requests to
//! mounted sub-routers, and reroutes failures to failure handlers. The
//! `http` module puts the registry behind an axum server driven by a TOML
//! config with hot reload.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{Dispatch, Outcome, RouteBuilder, Router, RoutingContext};
