//! Config-driven route handlers.
//!
//! # Responsibilities
//! - Turn each `ActionConfig` into a `Handler`
//! - Build a complete `Router` (sub-routers and mounts included) from a
//!   validated `ServerConfig`
//!
//! # Design Decisions
//! - Sub-routers are built once and shared by every mount that names them
//! - Building re-checks cycles so an unvalidated config cannot recurse forever

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use futures_util::future::{self, BoxFuture};

use crate::config::schema::{ActionConfig, RouteConfig, ServerConfig};
use crate::config::validation::{compile_route_pattern, ROOT_ROUTER};
use crate::routing::{
    Handler, MatchOptions, Outcome, PatternError, RouteBuilder, Router, RoutingContext,
};

/// Error turning configuration into a router.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{router} route #{index}: {source}")]
    Pattern {
        router: String,
        index: usize,
        #[source]
        source: PatternError,
    },

    #[error("{router} route #{index}: {message}")]
    Invalid {
        router: String,
        index: usize,
        message: String,
    },

    #[error("unknown router {0:?}")]
    UnknownRouter(String),

    #[error("mount cycle through router {0:?}")]
    MountCycle(String),
}

/// Replies with a fixed status; `{name}` in the body expands to a param.
#[derive(Debug, Clone)]
pub struct RespondHandler {
    status: StatusCode,
    body: String,
    content_type: Option<HeaderValue>,
}

impl RespondHandler {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: HeaderValue) -> Self {
        self.content_type = Some(content_type);
        self
    }
}

impl Handler for RespondHandler {
    fn call<'a>(&'a self, ctx: &'a mut RoutingContext) -> BoxFuture<'a, Outcome> {
        let body = render_template(&self.body, ctx);
        ctx.respond(self.status, body);
        if let Some(ct) = &self.content_type {
            ctx.set_reply_header(CONTENT_TYPE, ct.clone());
        }
        Box::pin(future::ready(Outcome::Handled))
    }
}

/// Replies 200 with the bound params as a JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParamsHandler;

impl Handler for ParamsHandler {
    fn call<'a>(&'a self, ctx: &'a mut RoutingContext) -> BoxFuture<'a, Outcome> {
        let outcome = match serde_json::to_string(ctx.params()) {
            Ok(json) => {
                ctx.respond(StatusCode::OK, json);
                ctx.set_reply_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Outcome::Handled
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize params");
                Outcome::Fail(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };
        Box::pin(future::ready(outcome))
    }
}

/// Switches the request into failure mode.
#[derive(Debug, Clone, Copy)]
pub struct FailHandler {
    status: StatusCode,
}

impl FailHandler {
    pub fn new(status: StatusCode) -> Self {
        Self { status }
    }
}

impl Handler for FailHandler {
    fn call<'a>(&'a self, _ctx: &'a mut RoutingContext) -> BoxFuture<'a, Outcome> {
        Box::pin(future::ready(Outcome::Fail(self.status)))
    }
}

/// Adds a response header and passes the request on.
#[derive(Debug, Clone)]
pub struct HeaderHandler {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderHandler {
    pub fn new(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }
}

impl Handler for HeaderHandler {
    fn call<'a>(&'a self, ctx: &'a mut RoutingContext) -> BoxFuture<'a, Outcome> {
        ctx.set_reply_header(self.name.clone(), self.value.clone());
        Box::pin(future::ready(Outcome::Next))
    }
}

/// Expand `{name}` placeholders from the context's params.
///
/// `{status}` falls back to the failure code in failure mode. Unknown
/// names expand to nothing; `{{` and `}}` are literal braces.
pub fn render_template(template: &str, ctx: &RoutingContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }

        match tail[1..].find('}') {
            Some(end) => {
                let name = &tail[1..=end];
                if let Some(value) = ctx.param(name) {
                    out.push_str(value);
                } else if name == "status" {
                    if let Some(code) = ctx.failure_code() {
                        out.push_str(code.as_str());
                    }
                }
                rest = &tail[end + 2..];
            }
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Every router a config describes.
#[derive(Debug)]
pub struct RouterSet {
    pub root: Router,
    /// Sub-routers reachable through a mount, by name.
    pub named: BTreeMap<String, Arc<Router>>,
}

/// Build the root router described by `config`.
pub fn build_router(config: &ServerConfig) -> Result<Router, BuildError> {
    build_routers(config).map(|set| set.root)
}

/// Build the root router and keep handles to the mounted sub-routers.
pub fn build_routers(config: &ServerConfig) -> Result<RouterSet, BuildError> {
    let mut builder = RouterBuilder {
        config,
        options: MatchOptions::from(&config.matching),
        built: BTreeMap::new(),
        stack: Vec::new(),
    };
    let root = Router::with_options(builder.options);
    builder.register(ROOT_ROUTER, &root, &config.routes)?;

    tracing::debug!(
        routes = root.len(),
        sub_routers = builder.built.len(),
        "router built from config"
    );
    Ok(RouterSet {
        root,
        named: builder
            .built
            .into_iter()
            .map(|(name, router)| (name.to_string(), router))
            .collect(),
    })
}

struct RouterBuilder<'c> {
    config: &'c ServerConfig,
    options: MatchOptions,
    built: BTreeMap<&'c str, Arc<Router>>,
    stack: Vec<&'c str>,
}

impl<'c> RouterBuilder<'c> {
    fn named(&mut self, name: &'c str) -> Result<Arc<Router>, BuildError> {
        if let Some(router) = self.built.get(name) {
            return Ok(router.clone());
        }
        if self.stack.contains(&name) {
            return Err(BuildError::MountCycle(name.to_string()));
        }
        let sub = self
            .config
            .routers
            .get(name)
            .ok_or_else(|| BuildError::UnknownRouter(name.to_string()))?;

        self.stack.push(name);
        let router = Arc::new(Router::with_options(self.options));
        self.register(name, &router, &sub.routes)?;
        self.stack.pop();

        self.built.insert(name, router.clone());
        Ok(router)
    }

    fn register(
        &mut self,
        router_name: &str,
        router: &Router,
        routes: &'c [RouteConfig],
    ) -> Result<(), BuildError> {
        for (index, route) in routes.iter().enumerate() {
            let invalid = |message: String| BuildError::Invalid {
                router: router_name.to_string(),
                index,
                message,
            };
            let pattern_err = |source: PatternError| BuildError::Pattern {
                router: router_name.to_string(),
                index,
                source,
            };

            let mut builder = RouteBuilder::new()
                .enabled(route.enabled)
                .on_collision(route.collision.into());
            if let Some(name) = &route.name {
                builder = builder.name(name.clone());
            }
            if let Some(order) = route.order {
                builder = builder.order(order);
            }
            for method in &route.methods {
                let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                    .map_err(|_| invalid(format!("invalid HTTP method {method:?}")))?;
                builder = builder.method(method);
            }

            if let ActionConfig::Mount { router: target } = &route.action {
                let prefix = route
                    .path
                    .as_deref()
                    .ok_or_else(|| invalid("mount requires a path prefix".to_string()))?;
                let sub = self.named(target)?;
                router.mount_with(prefix, sub, builder).map_err(pattern_err)?;
                continue;
            }

            if let Some(pattern) = compile_route_pattern(route, self.options).map_err(pattern_err)? {
                builder = builder.pattern(pattern);
            }
            let handler = action_handler(&route.action).map_err(invalid)?;
            builder = if route.failure {
                builder.shared_failure_handler(handler)
            } else {
                builder.shared_handler(handler)
            };
            router.route(builder).map_err(pattern_err)?;
        }
        Ok(())
    }
}

fn action_handler(action: &ActionConfig) -> Result<Arc<dyn Handler>, String> {
    let status = |code: u16| {
        StatusCode::from_u16(code).map_err(|_| format!("invalid status code {code}"))
    };

    Ok(match action {
        ActionConfig::Respond {
            status: code,
            body,
            content_type,
        } => {
            let mut handler = RespondHandler::new(status(*code)?, body.clone());
            if let Some(ct) = content_type {
                let value = HeaderValue::from_str(ct)
                    .map_err(|_| format!("invalid content type {ct:?}"))?;
                handler = handler.with_content_type(value);
            }
            Arc::new(handler)
        }
        ActionConfig::Params => Arc::new(ParamsHandler),
        ActionConfig::Fail { status: code } => Arc::new(FailHandler::new(status(*code)?)),
        ActionConfig::Header { name, value } => {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| format!("invalid header name {name:?}"))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| format!("invalid header value {value:?}"))?;
            Arc::new(HeaderHandler::new(name, value))
        }
        ActionConfig::Mount { .. } => return Err("mount is not a handler".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Dispatch;

    fn config(raw: &str) -> ServerConfig {
        toml::from_str(raw).unwrap()
    }

    #[test]
    fn test_render_template() {
        let mut ctx = RoutingContext::new(Method::GET, "/");
        ctx.params_mut().insert("id", "42");
        ctx.params_mut().insert("*", "a/b");

        assert_eq!(render_template("user {id}", &ctx), "user 42");
        assert_eq!(render_template("{*}!{missing}", &ctx), "a/b!");
        assert_eq!(render_template("{{id}} {id}", &ctx), "{id} 42");
        assert_eq!(render_template("open {id", &ctx), "open {id");
        assert_eq!(render_template("}", &ctx), "}");
    }

    #[tokio::test]
    async fn test_build_router_end_to_end() {
        let router = build_router(&config(
            r#"
            [[routes]]
            path = "/*"
            action = { type = "header", name = "x-served-by", value = "dispatch" }

            [[routes]]
            path = "/users/:id"
            methods = ["get"]
            action = { type = "respond", body = "user {id}", content_type = "text/plain" }

            [[routes]]
            path = "/api"
            action = { type = "mount", router = "api" }

            [[routes]]
            failure = true
            action = { type = "respond", status = 418, body = "failed {status}" }

            [[routers.api.routes]]
            regex = "/items/(\\d+)"
            groups = ["item"]
            action = { type = "params" }

            [[routers.api.routes]]
            path = "/boom"
            action = { type = "fail", status = 503 }
            "#,
        ))
        .unwrap();
        assert_eq!(router.len(), 4);

        let mut ctx = RoutingContext::new(Method::GET, "/users/7");
        assert_eq!(router.handle(&mut ctx).await, Dispatch::Handled);
        let reply = ctx.take_reply();
        assert_eq!(reply.body, "user 7");
        assert_eq!(reply.headers["x-served-by"], "dispatch");
        assert_eq!(reply.headers[CONTENT_TYPE], "text/plain");

        let mut ctx = RoutingContext::new(Method::GET, "/api/items/12");
        assert_eq!(router.handle(&mut ctx).await, Dispatch::Handled);
        let json: serde_json::Value = serde_json::from_str(&ctx.reply().body).unwrap();
        assert_eq!(json["item"], "12");
        assert_eq!(json["*"], "api/items/12");

        let mut ctx = RoutingContext::new(Method::GET, "/api/boom");
        assert_eq!(router.handle(&mut ctx).await, Dispatch::Handled);
        assert_eq!(ctx.reply().status, StatusCode::IM_A_TEAPOT);
        assert_eq!(ctx.reply().body, "failed 503");
    }

    #[test]
    fn test_build_router_rejects_cycles_without_validation() {
        let err = build_router(&config(
            r#"
            [[routes]]
            path = "/a"
            action = { type = "mount", router = "a" }

            [[routers.a.routes]]
            path = "/again"
            action = { type = "mount", router = "a" }
            "#,
        ))
        .unwrap_err();
        assert!(matches!(err, BuildError::MountCycle(name) if name == "a"));
    }

    #[test]
    fn test_build_router_reports_bad_patterns() {
        let err = build_router(&config(
            r#"
            [[routes]]
            path = "/ok"
            action = { type = "params" }

            [[routes]]
            regex = "/(unclosed"
            action = { type = "params" }
            "#,
        ))
        .unwrap_err();
        assert!(matches!(err, BuildError::Pattern { index: 1, .. }));
    }
}
