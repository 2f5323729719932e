use std::path::PathBuf;

use axum::http::Method;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use dispatch_router::config::load_config;
use dispatch_router::http::build_routers;
use dispatch_router::routing::{Route, Router, RoutingContext};

#[derive(Parser)]
#[command(name = "route-cli")]
#[command(about = "Offline inspection tool for dispatch-router configs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config and print its route tables in traversal order
    Check {
        config: PathBuf,
    },
    /// Dispatch one request against a config without starting a server
    Match {
        config: PathBuf,
        method: String,
        /// Request path, optionally with a query string
        path: String,
    },
}

#[derive(Serialize)]
struct RouteRow {
    id: u64,
    name: Option<String>,
    order: i32,
    patterns: Vec<PatternRow>,
    methods: Vec<String>,
    enabled: bool,
    handlers: bool,
    failure_handlers: bool,
}

#[derive(Serialize)]
struct PatternRow {
    kind: &'static str,
    source: String,
}

impl From<&Route> for RouteRow {
    fn from(route: &Route) -> Self {
        Self {
            id: route.id().get(),
            name: route.name().map(str::to_string),
            order: route.order(),
            patterns: route
                .patterns()
                .iter()
                .map(|p| PatternRow {
                    kind: p.kind().as_str(),
                    source: p.source().to_string(),
                })
                .collect(),
            methods: route.methods().iter().map(ToString::to_string).collect(),
            enabled: route.is_enabled(),
            handlers: route.has_handlers(),
            failure_handlers: route.has_failure_handlers(),
        }
    }
}

fn table(router: &Router) -> Vec<RouteRow> {
    router.routes().iter().map(|r| RouteRow::from(&**r)).collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            let config = load_config(&config)?;
            let set = build_routers(&config)?;
            let named: serde_json::Map<String, serde_json::Value> = set
                .named
                .iter()
                .map(|(name, router)| Ok((name.clone(), serde_json::to_value(table(router))?)))
                .collect::<Result<_, serde_json::Error>>()?;

            let report = json!({
                "root": table(&set.root),
                "routers": named,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Match {
            config,
            method,
            path,
        } => {
            let config = load_config(&config)?;
            let router = build_routers(&config)?.root;
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;

            let mut ctx = match path.split_once('?') {
                Some((path, query)) => RoutingContext::new(method, path).with_query(query),
                None => RoutingContext::new(method, path),
            };
            let dispatch = router.handle(&mut ctx).await;
            let reply = ctx.take_reply();
            let status = dispatch.status().unwrap_or(reply.status);

            let report = json!({
                "outcome": dispatch.as_str(),
                "status": status.as_u16(),
                "params": ctx.params(),
                "visited": ctx.visited().iter().map(|id| id.get()).collect::<Vec<_>>(),
                "headers": reply
                    .headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), json!(v.to_str().unwrap_or("<binary>"))))
                    .collect::<serde_json::Map<_, _>>(),
                "body": reply.body,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
