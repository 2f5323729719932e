//! Config parsing, validation, router building and file watching.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use dispatch_router::config::{load_config, parse_config, watcher::ConfigWatcher, ConfigError};
use dispatch_router::http::{build_router, build_routers};
use dispatch_router::routing::{Dispatch, RoutingContext};

mod common;

const SITE: &str = r#"
[listener]
bind_address = "127.0.0.1:0"

[matching]
case_sensitive = false

[[routes]]
name = "health"
path = "/Health"
methods = ["GET"]
action = { type = "respond", body = "ok" }

[[routes]]
name = "files"
path = "/files/*"
action = { type = "respond", body = "file {*}" }

[[routes]]
name = "admin"
path = "/admin"
order = -10
action = { type = "mount", router = "admin" }

[[routes]]
name = "fallback"
failure = true
action = { type = "respond", status = 404, body = "custom {status}" }

[routers.admin]
[[routers.admin.routes]]
regex = "/users/(\\d+)"
groups = ["uid"]
methods = ["GET", "DELETE"]
action = { type = "params" }

[[routers.admin.routes]]
path = "/locked"
action = { type = "fail", status = 403 }
"#;

async fn run(router: &dispatch_router::routing::Router, method: Method, path: &str) -> (Dispatch, RoutingContext) {
    let mut ctx = RoutingContext::new(method, path);
    let outcome = router.handle(&mut ctx).await;
    (outcome, ctx)
}

#[tokio::test]
async fn test_config_drives_dispatch() {
    let config = common::config(SITE);
    let router = build_router(&config).unwrap();

    let (outcome, ctx) = run(&router, Method::GET, "/health/").await;
    assert_eq!(outcome, Dispatch::Handled);
    assert_eq!(ctx.reply().body, "ok");

    let (_, ctx) = run(&router, Method::GET, "/FILES/a%20b/c.txt").await;
    assert_eq!(ctx.reply().body, "file a b/c.txt");

    let (outcome, ctx) = run(&router, Method::DELETE, "/admin/users/12").await;
    assert_eq!(outcome, Dispatch::Handled);
    assert_eq!(ctx.reply().body, r#"{"uid":"12"}"#);

    // Failure route catches the 403 and renders it with its own status.
    let (outcome, ctx) = run(&router, Method::GET, "/admin/locked").await;
    assert_eq!(outcome, Dispatch::Handled);
    assert_eq!(ctx.reply().status, StatusCode::NOT_FOUND);
    assert_eq!(ctx.reply().body, "custom 403");

    let (outcome, ctx) = run(&router, Method::POST, "/admin/users/12").await;
    assert_eq!(outcome, Dispatch::Handled);
    assert_eq!(ctx.failure_code(), Some(StatusCode::METHOD_NOT_ALLOWED));
    assert_eq!(ctx.reply().body, "custom 405");
}

#[test]
fn test_mounted_router_order_and_sharing() {
    let config = common::config(SITE);
    let set = build_routers(&config).unwrap();

    let names: Vec<_> = set
        .root
        .routes()
        .iter()
        .map(|r| r.name().unwrap_or("").to_string())
        .collect();
    assert_eq!(names, vec!["admin", "health", "files", "fallback"]);
    assert_eq!(set.named["admin"].len(), 2);
}

#[test]
fn test_validation_reports_all_problems() {
    let err = parse_config(
        r#"
        [[routes]]
        path = "/a/*/b"
        action = { type = "params" }

        [[routes]]
        regex = "/x/(\\d+)"
        groups = ["first", "second"]
        action = { type = "params" }

        [[routes]]
        path = "/m"
        action = { type = "mount", router = "nowhere" }
        "#,
    )
    .unwrap_err();

    let errors = match err {
        ConfigError::Validation(errors) => errors,
        other => panic!("expected validation errors, got {other}"),
    };
    assert_eq!(errors.len(), 3);
    assert_eq!(errors[0].route, Some(0));
    assert!(errors[0].message.contains("wildcard"));
    assert_eq!(errors[1].route, Some(1));
    assert!(errors[1].message.contains("does not exist"));
    assert!(errors[2].message.contains("unknown router"));
}

#[test]
fn test_load_config_from_disk() {
    let path = std::env::temp_dir().join(format!("dispatch-router-load-{}.toml", std::process::id()));
    std::fs::write(&path, SITE).unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.routes.len(), 4);
    assert!(!config.matching.case_sensitive);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_watcher_delivers_valid_changes() {
    let path = std::env::temp_dir().join(format!("dispatch-router-watch-{}.toml", std::process::id()));
    std::fs::write(&path, "").unwrap();

    let (watcher, mut updates) = ConfigWatcher::new(&path);
    let _guard = watcher.run().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    std::fs::write(&path, SITE).unwrap();

    let found = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(config) = updates.recv().await {
            if config.routes.len() == 4 {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(found);

    let _ = std::fs::remove_file(&path);
}
