//! Per-request routing state.
//!
//! # Responsibilities
//! - Carry the immutable request head (method, path, query, headers)
//! - Accumulate path parameters bound by matched routes
//! - Track the mount-point stack of enclosing routers
//! - Hold the failure flag and the reply produced by handlers
//!
//! # Design Decisions
//! - One context per request, owned by the caller and passed by `&mut`
//! - Mount points are pushed/popped only through [`MountScope`], whose
//!   `Drop` runs on every exit path

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::ser::{Serialize, Serializer};

use crate::routing::pattern::{Captures, WILDCARD_PARAM};
use crate::routing::route::{relative_path, ParamCollision, RouteId};

/// Path parameters bound so far, in binding order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// The value bound by a trailing wildcard.
    pub fn wildcard(&self) -> Option<&str> {
        self.get(WILDCARD_PARAM)
    }

    /// Bind `name`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Merge a successful match. Returns `false` without touching
    /// anything when `policy` rejects a collision.
    pub(crate) fn merge(&mut self, captures: Captures<'_>, policy: ParamCollision) -> bool {
        if policy == ParamCollision::Reject && captures.iter().any(|(n, _)| self.contains(n)) {
            return false;
        }
        for (name, value) in captures.into_entries() {
            match self.entries.iter_mut().find(|(n, _)| n == name) {
                Some(entry) => {
                    if policy == ParamCollision::Override {
                        entry.1 = value.into_owned();
                    }
                }
                None => self.entries.push((name.to_string(), value.into_owned())),
            }
        }
        true
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Response produced by the handler that finished the walk.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Default for Reply {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }
}

/// Mutable state threaded through one request's traversal.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    request_id: Option<String>,
    params: Params,
    mount_points: Vec<Arc<str>>,
    failure: Option<StatusCode>,
    method_mismatch: bool,
    visited: Vec<RouteId>,
    reply: Reply,
}

impl RoutingContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            request_id: None,
            params: Params::new(),
            mount_points: Vec::new(),
            failure: None,
            method_mismatch: false,
            visited: Vec::new(),
            reply: Reply::default(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full request path, independent of any mount point.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request path relative to the innermost mount point.
    pub fn relative_path(&self) -> &str {
        relative_path(&self.path, self.mount_point()).unwrap_or(&self.path)
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Innermost mount point, `""` at the root router.
    pub fn mount_point(&self) -> &str {
        self.mount_points.last().map(|m| &**m).unwrap_or("")
    }

    pub fn mount_depth(&self) -> usize {
        self.mount_points.len()
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// Status that switched the walk into failure mode.
    pub fn failure_code(&self) -> Option<StatusCode> {
        self.failure
    }

    /// Ids of the routes whose handler chains ran, in order.
    pub fn visited(&self) -> &[RouteId] {
        &self.visited
    }

    pub fn reply(&self) -> &Reply {
        &self.reply
    }

    pub fn reply_mut(&mut self) -> &mut Reply {
        &mut self.reply
    }

    /// Set status and body of the reply.
    pub fn respond(&mut self, status: StatusCode, body: impl Into<String>) {
        self.reply.status = status;
        self.reply.body = body.into();
    }

    pub fn set_reply_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.reply.headers.insert(name, value);
    }

    pub fn take_reply(&mut self) -> Reply {
        std::mem::take(&mut self.reply)
    }

    pub(crate) fn mount_point_arc(&self) -> Option<Arc<str>> {
        self.mount_points.last().cloned()
    }

    pub(crate) fn path_and_params_mut(&mut self) -> (&str, &mut Params) {
        (&self.path, &mut self.params)
    }

    pub(crate) fn enter_failure(&mut self, code: StatusCode) {
        self.failure = Some(code);
    }

    pub(crate) fn note_method_mismatch(&mut self) {
        self.method_mismatch = true;
    }

    pub(crate) fn method_mismatch(&self) -> bool {
        self.method_mismatch
    }

    pub(crate) fn record_visit(&mut self, id: RouteId) {
        self.visited.push(id);
    }
}

/// Scoped mount-point push. The prefix is popped when the scope drops.
pub(crate) struct MountScope<'a> {
    ctx: &'a mut RoutingContext,
}

impl<'a> MountScope<'a> {
    pub(crate) fn enter(ctx: &'a mut RoutingContext, prefix: &str) -> Self {
        let joined: Arc<str> = format!("{}{}", ctx.mount_point(), prefix.trim_end_matches('/')).into();
        ctx.mount_points.push(joined);
        Self { ctx }
    }
}

impl Deref for MountScope<'_> {
    type Target = RoutingContext;

    fn deref(&self) -> &RoutingContext {
        self.ctx
    }
}

impl DerefMut for MountScope<'_> {
    fn deref_mut(&mut self) -> &mut RoutingContext {
        self.ctx
    }
}

impl Drop for MountScope<'_> {
    fn drop(&mut self) {
        self.ctx.mount_points.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::pattern::Pattern;

    #[test]
    fn test_merge_policies() {
        let pattern = Pattern::compile("/:id").unwrap();

        let mut params = Params::new();
        params.insert("id", "outer");

        assert!(params.merge(pattern.matches("/inner").unwrap(), ParamCollision::KeepExisting));
        assert_eq!(params.get("id"), Some("outer"));

        assert!(!params.merge(pattern.matches("/inner").unwrap(), ParamCollision::Reject));
        assert_eq!(params.get("id"), Some("outer"));

        assert!(params.merge(pattern.matches("/inner").unwrap(), ParamCollision::Override));
        assert_eq!(params.get("id"), Some("inner"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_mount_scope_pops_on_drop() {
        let mut ctx = RoutingContext::new(Method::GET, "/api/v1/users");
        {
            let mut outer = MountScope::enter(&mut ctx, "/api");
            assert_eq!(outer.mount_point(), "/api");
            assert_eq!(outer.relative_path(), "/v1/users");
            {
                let inner = MountScope::enter(&mut outer, "/v1/");
                assert_eq!(inner.mount_point(), "/api/v1");
                assert_eq!(inner.relative_path(), "/users");
                assert_eq!(inner.mount_depth(), 2);
            }
            assert_eq!(outer.mount_depth(), 1);
        }
        assert_eq!(ctx.mount_point(), "");
        assert_eq!(ctx.mount_depth(), 0);
    }

    #[test]
    fn test_params_serialize_as_map() {
        let mut params = Params::new();
        params.insert("id", "7");
        params.insert("*", "a/b");
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!({"id": "7", "*": "a/b"}));
    }
}
