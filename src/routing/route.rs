//! A single registered endpoint.
//!
//! # Responsibilities
//! - Own compiled patterns, method filter, order and handler chains
//! - Decide whether a request (relative to a mount point) hits this route
//! - Bind captured parameters atomically on success
//!
//! # Design Decisions
//! - Identity is a process-wide sequence number, never derived from `order`
//! - `enabled` is atomic so routes can be toggled while requests are in flight
//! - Method mismatches are not matches, but are remembered on the context so
//!   the router can answer 405 instead of 404

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::Method;

use crate::routing::context::RoutingContext;
use crate::routing::handler::Handler;
use crate::routing::pattern::{MatchOptions, Pattern, PatternError};

static NEXT_ROUTE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique, comparison-stable route identity.
///
/// Ids are handed out in registration order and break ties between
/// routes that share an `order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteId(u64);

impl RouteId {
    fn next() -> Self {
        Self(NEXT_ROUTE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route-{}", self.0)
    }
}

/// What to do when a captured name is already bound on the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamCollision {
    /// Leave the earlier binding in place.
    #[default]
    KeepExisting,
    /// Replace the earlier binding.
    Override,
    /// Treat the route as not matching.
    Reject,
}

/// A registered route. Immutable apart from the `enabled` flag.
pub struct Route {
    id: RouteId,
    name: Option<String>,
    order: i32,
    patterns: Vec<Pattern>,
    methods: Vec<Method>,
    enabled: AtomicBool,
    collision: ParamCollision,
    binds_params: bool,
    handlers: Vec<Arc<dyn Handler>>,
    failure_handlers: Vec<Arc<dyn Handler>>,
}

impl Route {
    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn collision(&self) -> ParamCollision {
        self.collision
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn has_handlers(&self) -> bool {
        !self.handlers.is_empty()
    }

    pub fn has_failure_handlers(&self) -> bool {
        !self.failure_handlers.is_empty()
    }

    pub(crate) fn handlers(&self) -> &[Arc<dyn Handler>] {
        &self.handlers
    }

    pub(crate) fn failure_handlers(&self) -> &[Arc<dyn Handler>] {
        &self.failure_handlers
    }

    /// Ordering key: `order` ascending, then registration sequence.
    pub(crate) fn sort_key(&self) -> (i32, RouteId) {
        (self.order, self.id)
    }

    fn accepts_method(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    /// Test the route against the context's request, relative to `mount_point`.
    ///
    /// `failure` selects which handler chain is probed. On success the
    /// captured parameters are merged into the context; on failure the
    /// context's parameters are left untouched.
    pub fn matches(&self, ctx: &mut RoutingContext, mount_point: &str, failure: bool) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let has_chain = if failure {
            self.has_failure_handlers()
        } else {
            self.has_handlers()
        };
        if !has_chain {
            return false;
        }

        let method_ok = self.accepts_method(ctx.method());
        let mut excluded_by_method = false;
        {
            let (path, params) = ctx.path_and_params_mut();
            let Some(relative) = relative_path(path, mount_point) else {
                return false;
            };

            for pattern in &self.patterns {
                let Some(captures) = pattern.matches(relative) else {
                    continue;
                };
                if !method_ok {
                    excluded_by_method = true;
                    break;
                }
                if self.binds_params && !params.merge(captures, self.collision) {
                    return false;
                }
                return true;
            }
        }

        if excluded_by_method && !failure {
            ctx.note_method_mismatch();
        }
        false
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("order", &self.order)
            .field(
                "patterns",
                &self.patterns.iter().map(Pattern::source).collect::<Vec<_>>(),
            )
            .field("methods", &self.methods)
            .field("enabled", &self.is_enabled())
            .field("handlers", &self.handlers.len())
            .field("failure_handlers", &self.failure_handlers.len())
            .finish()
    }
}

/// Strip `mount_point` from `path`, respecting segment boundaries.
pub(crate) fn relative_path<'a>(path: &'a str, mount_point: &str) -> Option<&'a str> {
    let mount = mount_point.trim_end_matches('/');
    if mount.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(mount)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

enum PatternSource {
    Template(String),
    Regex {
        expr: String,
        groups: Option<Vec<(String, usize)>>,
    },
    Compiled(Pattern),
}

/// Describes a route before registration. Patterns compile when the
/// builder is handed to [`Router::route`](crate::routing::Router::route).
#[derive(Default)]
pub struct RouteBuilder {
    name: Option<String>,
    order: Option<i32>,
    patterns: Vec<PatternSource>,
    methods: Vec<Method>,
    enabled: Option<bool>,
    collision: ParamCollision,
    binds_params: Option<bool>,
    handlers: Vec<Arc<dyn Handler>>,
    failure_handlers: Vec<Arc<dyn Handler>>,
}

impl RouteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a path template.
    pub fn path(template: impl Into<String>) -> Self {
        Self::new().and_path(template)
    }

    /// Start from a regular expression.
    pub fn regex(expr: impl Into<String>) -> Self {
        Self::new().and_regex(expr)
    }

    /// Add another path template; the first matching pattern wins.
    pub fn and_path(mut self, template: impl Into<String>) -> Self {
        self.patterns.push(PatternSource::Template(template.into()));
        self
    }

    pub fn and_regex(mut self, expr: impl Into<String>) -> Self {
        self.patterns.push(PatternSource::Regex {
            expr: expr.into(),
            groups: None,
        });
        self
    }

    /// Add a regular expression with an explicit name → group table.
    pub fn and_regex_groups<N: Into<String>>(
        mut self,
        expr: impl Into<String>,
        groups: impl IntoIterator<Item = (N, usize)>,
    ) -> Self {
        self.patterns.push(PatternSource::Regex {
            expr: expr.into(),
            groups: Some(groups.into_iter().map(|(n, i)| (n.into(), i)).collect()),
        });
        self
    }

    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.patterns.push(PatternSource::Compiled(pattern));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    pub fn methods(self, methods: impl IntoIterator<Item = Method>) -> Self {
        methods.into_iter().fold(self, RouteBuilder::method)
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn on_collision(mut self, policy: ParamCollision) -> Self {
        self.collision = policy;
        self
    }

    pub(crate) fn without_params(mut self) -> Self {
        self.binds_params = Some(false);
        self
    }

    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn failure_handler(mut self, handler: impl Handler) -> Self {
        self.failure_handlers.push(Arc::new(handler));
        self
    }

    pub(crate) fn shared_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub(crate) fn shared_failure_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.failure_handlers.push(handler);
        self
    }

    /// Compile every pattern and freeze the route.
    pub(crate) fn build(self, default_order: i32, options: MatchOptions) -> Result<Route, PatternError> {
        let mut patterns = Vec::with_capacity(self.patterns.len());
        for source in self.patterns {
            let pattern = match source {
                PatternSource::Template(template) => Pattern::compile_with(&template, options)?,
                PatternSource::Regex { expr, groups } => {
                    let table: Option<Vec<(&str, usize)>> = groups
                        .as_ref()
                        .map(|g| g.iter().map(|(n, i)| (n.as_str(), *i)).collect());
                    Pattern::regex_with(&expr, table.as_deref(), options)?
                }
                PatternSource::Compiled(pattern) => pattern,
            };
            patterns.push(pattern);
        }
        // A route without patterns answers every path under its mount point.
        if patterns.is_empty() {
            patterns.push(Pattern::compile_with("/*", options)?);
        }

        Ok(Route {
            id: RouteId::next(),
            name: self.name,
            order: self.order.unwrap_or(default_order),
            patterns,
            methods: self.methods,
            enabled: AtomicBool::new(self.enabled.unwrap_or(true)),
            collision: self.collision,
            binds_params: self.binds_params.unwrap_or(true),
            handlers: self.handlers,
            failure_handlers: self.failure_handlers,
        })
    }
}
