//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile every pattern so registration cannot fail later
//! - Check referential integrity (mounts reference existing routers)
//! - Detect mount cycles
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::BTreeSet;

use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use thiserror::Error;

use crate::config::schema::{ActionConfig, RouteConfig, ServerConfig};
use crate::routing::{MatchOptions, Pattern, PatternError};

/// A single semantic problem, located by router and route index.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{router}{}: {message}", location(.route))]
pub struct ValidationError {
    /// `"root"` or the sub-router's name.
    pub router: String,
    /// Index into the router's `routes`, if the problem is route-specific.
    pub route: Option<usize>,
    pub message: String,
}

fn location(route: &Option<usize>) -> String {
    route.map(|idx| format!(" route #{idx}")).unwrap_or_default()
}

pub const ROOT_ROUTER: &str = "root";

/// Validate the whole configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let options = MatchOptions::from(&config.matching);

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError {
            router: ROOT_ROUTER.to_string(),
            route: None,
            message: format!("invalid bind address {:?}", config.listener.bind_address),
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError {
            router: ROOT_ROUTER.to_string(),
            route: None,
            message: "request timeout must be greater than zero".to_string(),
        });
    }

    validate_routes(ROOT_ROUTER, &config.routes, config, options, &mut errors);
    for (name, router) in &config.routers {
        validate_routes(name, &router.routes, config, options, &mut errors);
    }

    let mut visiting = Vec::new();
    let mut done = BTreeSet::new();
    detect_cycles(ROOT_ROUTER, &config.routes, config, &mut visiting, &mut done, &mut errors);
    for (name, router) in &config.routers {
        detect_cycles(name, &router.routes, config, &mut visiting, &mut done, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_routes(
    router: &str,
    routes: &[RouteConfig],
    config: &ServerConfig,
    options: MatchOptions,
    errors: &mut Vec<ValidationError>,
) {
    for (idx, route) in routes.iter().enumerate() {
        let mut report = |message: String| {
            errors.push(ValidationError {
                router: router.to_string(),
                route: Some(idx),
                message,
            })
        };

        for method in &route.methods {
            if Method::from_bytes(method.to_ascii_uppercase().as_bytes()).is_err() {
                report(format!("invalid HTTP method {method:?}"));
            }
        }

        match &route.action {
            ActionConfig::Mount { router: target } => {
                match (&route.path, &route.regex) {
                    (Some(prefix), None) => {
                        if let Err(e) = crate::routing::pattern::validate_mount_point(prefix) {
                            report(e.to_string());
                        }
                    }
                    _ => report("mount requires a literal `path` prefix and no `regex`".to_string()),
                }
                if !config.routers.contains_key(target) {
                    report(format!("mount references unknown router {target:?}"));
                }
                if route.failure {
                    report("mount routes cannot be failure-only".to_string());
                }
            }
            action => {
                if route.path.is_some() && route.regex.is_some() {
                    report("`path` and `regex` are mutually exclusive".to_string());
                }
                if let Err(e) = compile_route_pattern(route, options) {
                    report(e.to_string());
                }
                if !route.groups.is_empty() && route.regex.is_none() {
                    report("`groups` only applies to `regex` routes".to_string());
                }
                validate_action(action, &mut report);
            }
        }
    }
}

fn validate_action(action: &ActionConfig, report: &mut impl FnMut(String)) {
    match action {
        ActionConfig::Respond {
            status,
            content_type,
            ..
        } => {
            if StatusCode::from_u16(*status).is_err() {
                report(format!("invalid status code {status}"));
            }
            if let Some(ct) = content_type {
                if HeaderValue::from_str(ct).is_err() {
                    report(format!("invalid content type {ct:?}"));
                }
            }
        }
        ActionConfig::Fail { status } => match StatusCode::from_u16(*status) {
            Ok(code) if code.is_client_error() || code.is_server_error() => {}
            _ => report(format!("fail status must be a 4xx or 5xx code, got {status}")),
        },
        ActionConfig::Header { name, value } => {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                report(format!("invalid header name {name:?}"));
            }
            if HeaderValue::from_str(value).is_err() {
                report(format!("invalid header value {value:?}"));
            }
        }
        ActionConfig::Params | ActionConfig::Mount { .. } => {}
    }
}

/// Compile the pattern a non-mount route declares, if any.
pub(crate) fn compile_route_pattern(
    route: &RouteConfig,
    options: MatchOptions,
) -> Result<Option<Pattern>, PatternError> {
    if let Some(expr) = &route.regex {
        let table: Vec<(&str, usize)> = route
            .groups
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i + 1))
            .collect();
        let groups = (!table.is_empty()).then_some(table.as_slice());
        return Pattern::regex_with(expr, groups, options).map(Some);
    }
    match &route.path {
        Some(path) => Pattern::compile_with(path, options).map(Some),
        None => Ok(None),
    }
}

fn detect_cycles<'a>(
    name: &'a str,
    routes: &'a [RouteConfig],
    config: &'a ServerConfig,
    visiting: &mut Vec<&'a str>,
    done: &mut BTreeSet<&'a str>,
    errors: &mut Vec<ValidationError>,
) {
    if done.contains(name) {
        return;
    }
    if visiting.contains(&name) {
        let mut chain: Vec<&str> = visiting.clone();
        chain.push(name);
        errors.push(ValidationError {
            router: name.to_string(),
            route: None,
            message: format!("mount cycle: {}", chain.join(" -> ")),
        });
        return;
    }

    visiting.push(name);
    for route in routes {
        if let ActionConfig::Mount { router: target } = &route.action {
            if let Some((key, sub)) = config.routers.get_key_value(target.as_str()) {
                detect_cycles(key, &sub.routes, config, visiting, done, errors);
            }
        }
    }
    visiting.pop();
    done.insert(name);
}
