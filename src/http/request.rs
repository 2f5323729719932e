//! Request handling.
//!
//! # Responsibilities
//! - Attach a request ID as early as possible (generate or keep the client's)
//! - Extract routing-relevant information (method, path, query, headers)
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The routing layer sees a `RoutingContext`, never the raw request

use axum::http::request::Parts;
use axum::http::HeaderName;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::routing::RoutingContext;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Layer that assigns a UUID request ID unless the client sent one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer that copies the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Build the routing context for an incoming request.
pub fn routing_context(parts: &Parts) -> RoutingContext {
    let mut ctx = RoutingContext::new(parts.method.clone(), parts.uri.path())
        .with_headers(parts.headers.clone());
    if let Some(query) = parts.uri.query() {
        ctx = ctx.with_query(query);
    }
    if let Some(id) = parts
        .headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
    {
        ctx = ctx.with_request_id(id);
    }
    ctx
}
