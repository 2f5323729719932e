//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, layers, single fallback handler)
//!     → request.rs (request ID, build RoutingContext)
//!     → routing::Router::handle (handlers built by actions.rs)
//!     → response.rs (Dispatch + Reply → Response)
//!     → Send to client
//! ```

pub mod actions;
pub mod request;
pub mod response;
pub mod server;

pub use actions::{build_router, build_routers, BuildError, RouterSet};
pub use request::X_REQUEST_ID;
pub use server::{apply_config, AppState, HttpServer};
