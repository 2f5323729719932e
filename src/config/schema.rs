//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! dispatch server. All types derive Serde traits for deserialization
//! from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::routing::{MatchOptions, ParamCollision};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Pattern matching knobs shared by every router.
    pub matching: MatchingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Routes of the root router, in registration order.
    pub routes: Vec<RouteConfig>,

    /// Named sub-routers available to `mount` actions.
    pub routers: BTreeMap<String, SubRouterConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Compare literal path segments case-sensitively.
    pub case_sensitive: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            case_sensitive: true,
        }
    }
}

impl From<&MatchingConfig> for MatchOptions {
    fn from(config: &MatchingConfig) -> Self {
        MatchOptions {
            case_sensitive: config.case_sensitive,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A named router that can be mounted under a prefix.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SubRouterConfig {
    pub routes: Vec<RouteConfig>,
}

/// One route definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging.
    #[serde(default)]
    pub name: Option<String>,

    /// Path template (`/users/:id`, `/static/*`). Exclusive with `regex`.
    #[serde(default)]
    pub path: Option<String>,

    /// Regular expression matched against the whole mount-relative path.
    #[serde(default)]
    pub regex: Option<String>,

    /// Parameter names for regex groups 1..n. Empty = use group names.
    #[serde(default)]
    pub groups: Vec<String>,

    /// HTTP methods to accept. Empty = any method.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Explicit priority (lower runs first). Defaults to registration order.
    #[serde(default)]
    pub order: Option<i32>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Register the action as a failure handler instead of a normal one.
    #[serde(default)]
    pub failure: bool,

    #[serde(default)]
    pub collision: CollisionPolicy,

    pub action: ActionConfig,
}

fn default_enabled() -> bool {
    true
}

/// What a matched route does.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Reply with a fixed status and a body; `{name}` expands to a param.
    Respond {
        #[serde(default = "default_status")]
        status: u16,
        #[serde(default)]
        body: String,
        #[serde(default)]
        content_type: Option<String>,
    },
    /// Reply 200 with the bound params as a JSON object.
    Params,
    /// Switch the request into failure mode with `status`.
    Fail { status: u16 },
    /// Add a response header and pass the request on.
    Header { name: String, value: String },
    /// Delegate to a named sub-router; `path` is the mount prefix.
    Mount { router: String },
}

fn default_status() -> u16 {
    200
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    #[default]
    KeepExisting,
    Override,
    Reject,
}

impl From<CollisionPolicy> for ParamCollision {
    fn from(policy: CollisionPolicy) -> Self {
        match policy {
            CollisionPolicy::KeepExisting => ParamCollision::KeepExisting,
            CollisionPolicy::Override => ParamCollision::Override,
            CollisionPolicy::Reject => ParamCollision::Reject,
        }
    }
}
