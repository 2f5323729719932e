//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (any time, any thread):
//!     RouteBuilder (templates / regexes, methods, order, handlers)
//!     → pattern.rs (compile, reject malformed input)
//!     → route.rs (freeze as Route with a fresh RouteId)
//!     → store.rs (copy-on-write insert at (order, id) position)
//!
//! Incoming request (method, path, headers)
//!     → context.rs (RoutingContext)
//!     → router.rs (walk snapshot in order)
//!     → route.rs matches() → handler.rs chain → Outcome
//!     → Next: keep walking | Handled: stop | Fail: failure walk from root
//!     → Dispatch (Handled / NotFound / MethodNotAllowed / Unhandled)
//! ```
//!
//! # Design Decisions
//! - Deterministic: same route set + same request = same traversal
//! - Traversals take a snapshot; registration never blocks matching
//! - Pattern kinds form a closed enum with one match routine each

pub mod context;
pub mod handler;
pub mod pattern;
pub mod route;
pub mod router;
pub mod store;

pub use context::{Params, Reply, RoutingContext};
pub use handler::{from_fn, FnHandler, Handler, Outcome};
pub use pattern::{Captures, MatchOptions, Pattern, PatternError, PatternKind, WILDCARD_PARAM};
pub use route::{ParamCollision, Route, RouteBuilder, RouteId};
pub use router::{Dispatch, RouteHandle, Router};
pub use store::{CowRouteStore, RouteStore, Snapshot};
