//! Response rendering.
//!
//! # Responsibilities
//! - Map a `Dispatch` outcome to an HTTP status
//! - Render the reply a handler produced, headers included
//!
//! # Design Decisions
//! - Handled requests use the handler's reply verbatim
//! - Unclaimed outcomes get a short plain-text body unless a handler
//!   already wrote one

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::Response;

use crate::routing::{Dispatch, Reply};

/// Turn the traversal result into the response sent to the client.
pub fn render(dispatch: Dispatch, reply: Reply) -> Response {
    let Reply {
        status,
        headers,
        mut body,
    } = reply;

    let status = match dispatch.status() {
        None => status,
        Some(code) => {
            if body.is_empty() {
                body = code.canonical_reason().unwrap_or("Error").to_string();
            }
            code
        }
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    if !response.headers().contains_key(CONTENT_TYPE) {
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_render_handled_reply() {
        let mut reply = Reply {
            status: StatusCode::CREATED,
            body: "made".into(),
            ..Reply::default()
        };
        reply
            .headers
            .insert("x-extra", HeaderValue::from_static("1"));

        let response = render(Dispatch::Handled, reply);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-extra"], "1");
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"made");
    }

    #[tokio::test]
    async fn test_render_unclaimed_outcomes() {
        let response = render(Dispatch::NotFound, Reply::default());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Not Found");

        let response = render(Dispatch::MethodNotAllowed, Reply::default());
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = render(
            Dispatch::Unhandled(StatusCode::SERVICE_UNAVAILABLE),
            Reply::default(),
        );
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
