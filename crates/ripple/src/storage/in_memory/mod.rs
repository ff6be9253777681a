//! In-memory graph store using HashMap and petgraph.
//!
//! All data is held in RAM. On its own the store is **ephemeral**; wrap it
//! with [`StoreBackend::Snapshot`](crate::storage::StoreBackend::Snapshot) or
//! call [`save_snapshot`] / [`load_snapshot`] directly to persist it.
//!
//! # Architecture
//!
//! - `HashMap<ComponentId, Component>` arena for O(1) lookups
//! - `petgraph::StableDiGraph` whose edges carry the full [`Dependency`](crate::domain::Dependency)
//! - `HashMap<ComponentId, NodeIndex>` mapping ids to graph nodes
//!
//! Edges point from the dependent to the dependency. The same
//! `(source, target)` pair may carry several edges of different types.
//!
//! # Thread Safety
//!
//! The graph is wrapped in `Arc<RwLock<GraphInner>>`. Queries share a read
//! lock; every mutation validates and commits under a single write lock.
//!
//! # Performance Characteristics
//!
//! - Insert / lookup / update: O(1)
//! - Remove: O(d) where d is the number of incident edges
//! - Cycle check: O(reachable subgraph from the new edge's target)
//! - Closure, layers, walks: O(n + e) over the visited subgraph

mod graph;
mod inner;
mod snapshot;
mod trait_impl;

use crate::storage::GraphStore;
use inner::GraphInner;
use std::sync::Arc;
use tokio::sync::RwLock;

pub use snapshot::{LoadWarning, load_snapshot, save_snapshot};

/// Thread-safe in-memory store.
///
/// Implements [`GraphStore`] via `trait_impl.rs`.
pub(crate) type InMemoryStore = Arc<RwLock<GraphInner>>;

/// Create a new, empty in-memory store.
///
/// # Example
///
/// ```
/// use ripple::storage::in_memory::new_in_memory_store;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let store = new_in_memory_store();
///     assert_eq!(store.stats().await.unwrap().components, 0);
/// }
/// ```
pub fn new_in_memory_store() -> Arc<dyn GraphStore> {
    Arc::new(InMemoryStore::new(RwLock::new(GraphInner::new())))
}
