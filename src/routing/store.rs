//! Ordered, concurrently mutable route storage.
//!
//! # Responsibilities
//! - Keep routes sorted by `(order, id)`
//! - Hand out point-in-time snapshots to traversals
//! - Accept inserts/removals from any thread while traversals run
//!
//! # Design Decisions
//! - Copy-on-write: writers rebuild the vector and publish it atomically,
//!   readers only bump a reference count
//! - Registration changes are rare next to traversals, so writes pay the copy
//! - Identity decides membership; the ordering key never deduplicates

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::routing::route::{Route, RouteId};

/// Immutable view of the routes at one instant, in traversal order.
pub type Snapshot = Arc<Vec<Arc<Route>>>;

/// Storage behind a [`Router`](crate::routing::Router).
pub trait RouteStore: Send + Sync + std::fmt::Debug {
    /// Insert a route at its ordered position. Inserting an id that is
    /// already present is a no-op.
    fn insert(&self, route: Arc<Route>);

    /// Remove the route with the given id.
    fn remove(&self, id: RouteId) -> Option<Arc<Route>>;

    fn clear(&self);

    fn snapshot(&self) -> Snapshot;

    fn len(&self) -> usize {
        self.snapshot().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Copy-on-write store built on [`ArcSwap`].
#[derive(Debug)]
pub struct CowRouteStore {
    routes: ArcSwap<Vec<Arc<Route>>>,
}

impl CowRouteStore {
    pub fn new() -> Self {
        Self {
            routes: ArcSwap::from_pointee(Vec::new()),
        }
    }
}

impl Default for CowRouteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteStore for CowRouteStore {
    fn insert(&self, route: Arc<Route>) {
        let key = route.sort_key();
        self.routes.rcu(|current| {
            if current.iter().any(|r| r.id() == route.id()) {
                return Vec::clone(current);
            }
            let mut next = Vec::with_capacity(current.len() + 1);
            let pos = current.partition_point(|r| r.sort_key() < key);
            next.extend_from_slice(&current[..pos]);
            next.push(route.clone());
            next.extend_from_slice(&current[pos..]);
            next
        });
    }

    fn remove(&self, id: RouteId) -> Option<Arc<Route>> {
        let mut removed = None;
        self.routes.rcu(|current| {
            removed = None;
            let mut next = Vec::with_capacity(current.len());
            for route in current.iter() {
                if route.id() == id {
                    removed = Some(route.clone());
                } else {
                    next.push(route.clone());
                }
            }
            next
        });
        removed
    }

    fn clear(&self) {
        self.routes.store(Arc::new(Vec::new()));
    }

    fn snapshot(&self) -> Snapshot {
        self.routes.load_full()
    }

    fn len(&self) -> usize {
        self.routes.load().len()
    }
}
