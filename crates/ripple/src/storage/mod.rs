//! Graph store abstraction for ripple.
//!
//! This module provides the core storage trait and factory for creating
//! graph store backends:
//!
//! - **In-memory**: Fast, ephemeral storage backed by HashMap and petgraph
//! - **Snapshot**: The in-memory store persisted to a JSON Lines file
//!
//! # Architecture
//!
//! The store is shared by many concurrent callers, so every method takes
//! `&self` and implementations synchronize internally. Each structural
//! mutation is a single trait call that validates and commits under one
//! write lock; callers never observe (or create) a state between the check
//! and the commit. In particular [`GraphStore::add_dependency`] runs the
//! cycle check and the edge insertion atomically, so two concurrent calls
//! cannot both pass the check against a stale view.
//!
//! Reads take a shared lock and run concurrently with each other.
//!
//! # Edge direction
//!
//! Edges point from the dependent to its dependency: `source -> target`
//! means "source requires target". [`TraversalDirection::Dependencies`]
//! follows edges forward, [`TraversalDirection::Dependents`] backward.
//!
//! # Example
//!
//! ```no_run
//! use ripple::domain::{ComponentType, DependencyType, NewComponent, NewDependency};
//! use ripple::storage::{create_store, Deadline, StoreBackend};
//! use chrono::Utc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let store = create_store(StoreBackend::InMemory).await?;
//!
//!     let now = Utc::now();
//!     for id in ["web", "api"] {
//!         let new = NewComponent::new(id, id, ComponentType::Service, "1.0.0", "shop");
//!         store.insert_component(new.into_component(now)).await?;
//!     }
//!     store
//!         .add_dependency(
//!             NewDependency::new("web", "api", DependencyType::ApiCall),
//!             Deadline::none(),
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use crate::domain::{
    Component, ComponentFilter, ComponentId, ComponentUpdate, Dependency, DependencyPath,
    DependencyStrength, DependencyType, NewDependency,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

// Storage backend implementations
pub mod in_memory;

pub use in_memory::{LoadWarning, load_snapshot, save_snapshot};

/// Which way a traversal follows edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDirection {
    /// Follow edges forward: the components a component requires.
    Dependencies,
    /// Follow edges backward: the components that require a component.
    Dependents,
}

/// Point in time after which a traversal must stop.
///
/// Traversals call [`Deadline::check`] once per visited node and abort with
/// [`Error::DeadlineExceeded`] instead of returning a partial result.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self { at: None }
    }

    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
        }
    }

    /// Time left before expiry, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Fail with [`Error::DeadlineExceeded`] if the deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(Error::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

/// A component reached by a breadth-first walk, with its layer number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayeredComponent {
    /// The reached component
    pub component: Component,
    /// BFS layer (1 for direct neighbors)
    pub depth: usize,
}

/// Result of a depth-bounded breadth-first walk.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayeredWalk {
    /// Reached components in BFS order, start excluded
    pub entries: Vec<LayeredComponent>,
    /// `true` if the depth bound stopped the walk before it was exhausted
    pub truncated: bool,
}

impl LayeredWalk {
    /// Deepest layer reached, 0 when nothing was reached.
    pub fn max_depth(&self) -> usize {
        self.entries.iter().map(|e| e.depth).max().unwrap_or(0)
    }
}

/// A component reached by a depth-bounded depth-first walk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkEntry {
    /// The reached component
    pub component: Component,
    /// Hops from the walk root that first reached it (0 for the root)
    pub hops: usize,
    /// The walk root that reached it
    pub root: ComponentId,
}

/// Size summary of a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of components
    pub components: usize,
    /// Number of dependency edges
    pub dependencies: usize,
}

/// Core storage trait for the component graph.
///
/// Implementations must be `Send + Sync`: a single store is shared by every
/// concurrent request through an `Arc<dyn GraphStore>`.
///
/// # Method Categories
///
/// - **Components**: `insert_component`, `insert_batch`, `get_component`,
///   `update_component`, `remove_component`, `list`
/// - **Edges**: `add_dependency`, `remove_dependency`, `dependencies`, `dependents`
/// - **Traversals**: `has_cycle`, `reachable`, `find_path`, `dependent_layers`,
///   `dependency_walk`
/// - **Persistence**: `export`, `save`, `reload`
///
/// # Error Handling
///
/// - `ComponentNotFound`: a referenced component doesn't exist
/// - `DuplicateComponent`: id already registered
/// - `DependentsExist`: cannot remove a component that others depend on
/// - `CircularDependency` / `SelfDependency` / `DependencyConflict`: edge rejected
/// - `DeadlineExceeded`: a traversal ran past its deadline
/// - `StoreUnavailable`: the backing store could not be reached
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ========== Components ==========

    /// Insert a new component.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateComponent` if the id is taken; the stored
    /// component is left untouched.
    async fn insert_component(&self, component: Component) -> Result<Component>;

    /// Insert components and edges as one unit.
    ///
    /// Either everything is committed or nothing is. Edges may reference
    /// components from the same batch or components already stored.
    /// `deadline` bounds the cycle checks, as in
    /// [`GraphStore::add_dependency`].
    async fn insert_batch(
        &self,
        components: Vec<Component>,
        dependencies: Vec<NewDependency>,
        deadline: Deadline,
    ) -> Result<Vec<Component>>;

    /// Get a component by id. Returns `None` if it doesn't exist.
    async fn get_component(&self, id: &ComponentId) -> Result<Option<Component>>;

    /// Apply a validated partial update.
    ///
    /// Returns `(previous, updated)`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ComponentNotFound` if the component doesn't exist.
    async fn update_component(
        &self,
        id: &ComponentId,
        update: &ComponentUpdate,
    ) -> Result<(Component, Component)>;

    /// Remove a component and every edge touching it.
    ///
    /// Returns the removed component and its removed outgoing edges.
    ///
    /// # Errors
    ///
    /// - `Error::ComponentNotFound` if the component doesn't exist
    /// - `Error::DependentsExist` if any component depends on it
    async fn remove_component(&self, id: &ComponentId) -> Result<(Component, Vec<Dependency>)>;

    /// List components matching the filter, ordered by id.
    async fn list(&self, filter: &ComponentFilter) -> Result<Vec<Component>>;

    // ========== Edges ==========

    /// Add an edge after checking it under the write lock.
    ///
    /// The cycle check stops at `deadline`, releasing the lock without
    /// committing anything.
    ///
    /// # Errors
    ///
    /// - `Error::ComponentNotFound` if either endpoint doesn't exist
    /// - `Error::SelfDependency` if `source == target`
    /// - `Error::DependencyConflict` if an identical `(source, target, type)` edge exists
    /// - `Error::CircularDependency` if `target` already reaches `source`
    /// - `Error::CycleCheckTimeout` if the cycle check outlives `deadline`
    async fn add_dependency(
        &self,
        dependency: NewDependency,
        deadline: Deadline,
    ) -> Result<Dependency>;

    /// Remove the edge matching `(from, to, dep_type)`.
    ///
    /// # Errors
    ///
    /// - `Error::ComponentNotFound` if either endpoint doesn't exist
    /// - `Error::DependencyNotFound` if no such edge exists
    async fn remove_dependency(
        &self,
        from: &ComponentId,
        to: &ComponentId,
        dep_type: DependencyType,
    ) -> Result<Dependency>;

    /// Outgoing edges of a component (what it requires).
    async fn dependencies(&self, id: &ComponentId) -> Result<Vec<Dependency>>;

    /// Incoming edges of a component (what requires it).
    async fn dependents(&self, id: &ComponentId) -> Result<Vec<Dependency>>;

    // ========== Traversals ==========

    /// Check if adding `from -> to` would create a cycle.
    async fn has_cycle(
        &self,
        from: &ComponentId,
        to: &ComponentId,
        deadline: Deadline,
    ) -> Result<bool>;

    /// Transitive closure in the given direction, start excluded.
    async fn reachable(
        &self,
        id: &ComponentId,
        direction: TraversalDirection,
        deadline: Deadline,
    ) -> Result<Vec<Component>>;

    /// First discovered path `from -> ... -> to`, following edges forward.
    async fn find_path(
        &self,
        from: &ComponentId,
        to: &ComponentId,
        deadline: Deadline,
    ) -> Result<Option<DependencyPath>>;

    /// Breadth-first walk over dependents with layer numbers.
    ///
    /// Only edges whose strength is at least `min_strength` are followed.
    async fn dependent_layers(
        &self,
        id: &ComponentId,
        max_depth: Option<usize>,
        min_strength: DependencyStrength,
        deadline: Deadline,
    ) -> Result<LayeredWalk>;

    /// Depth-first walk over dependencies from each root with hop counts.
    ///
    /// Components already reached from an earlier root are not descended
    /// again. When `project_id` is set, roots and reached components outside
    /// that project are skipped. Unknown roots are skipped.
    async fn dependency_walk(
        &self,
        roots: &[ComponentId],
        project_id: Option<&str>,
        max_hops: Option<usize>,
        deadline: Deadline,
    ) -> Result<Vec<WalkEntry>>;

    // ========== Persistence ==========

    /// Export every component and edge.
    async fn export(&self) -> Result<(Vec<Component>, Vec<Dependency>)>;

    /// Size summary.
    async fn stats(&self) -> Result<StoreStats>;

    /// Save changes to persistent storage.
    ///
    /// For in-memory storage this is a no-op.
    async fn save(&self) -> Result<()>;

    /// Reload state from persistent storage, discarding in-memory changes.
    ///
    /// For in-memory storage this is a no-op.
    async fn reload(&self) -> Result<()>;
}

/// Store backend configuration.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// In-memory storage (ephemeral)
    InMemory,

    /// In-memory storage persisted to a snapshot file
    Snapshot(PathBuf),
}

impl StoreBackend {
    /// Returns the data file path for file-based backends.
    pub fn data_path(&self) -> Option<&Path> {
        match self {
            StoreBackend::Snapshot(path) => Some(path),
            StoreBackend::InMemory => None,
        }
    }
}

/// Wrapper that adds snapshot-file persistence to the in-memory store.
///
/// `save()` writes the whole graph atomically; `reload()` swaps in a freshly
/// loaded store. File system failures surface as `Error::StoreUnavailable`.
struct SnapshotBackedStore {
    inner: RwLock<Arc<dyn GraphStore>>,
    path: PathBuf,
}

impl SnapshotBackedStore {
    async fn current(&self) -> Arc<dyn GraphStore> {
        Arc::clone(&*self.inner.read().await)
    }
}

fn unavailable(path: &Path, err: &Error) -> Error {
    match err {
        Error::Io(_) => Error::StoreUnavailable(format!("{}: {err}", path.display())),
        _ => Error::StoreUnavailable(err.to_string()),
    }
}

async fn open_snapshot(path: &Path) -> Result<Arc<dyn GraphStore>> {
    if !path.exists() {
        return Ok(in_memory::new_in_memory_store());
    }

    let (store, warnings) = load_snapshot(path)
        .await
        .map_err(|e| unavailable(path, &e))?;
    for warning in &warnings {
        tracing::warn!(warning = ?warning, "Snapshot load warning");
    }
    Ok(store)
}

#[async_trait]
impl GraphStore for SnapshotBackedStore {
    async fn insert_component(&self, component: Component) -> Result<Component> {
        self.current().await.insert_component(component).await
    }

    async fn insert_batch(
        &self,
        components: Vec<Component>,
        dependencies: Vec<NewDependency>,
        deadline: Deadline,
    ) -> Result<Vec<Component>> {
        self.current()
            .await
            .insert_batch(components, dependencies, deadline)
            .await
    }

    async fn get_component(&self, id: &ComponentId) -> Result<Option<Component>> {
        self.current().await.get_component(id).await
    }

    async fn update_component(
        &self,
        id: &ComponentId,
        update: &ComponentUpdate,
    ) -> Result<(Component, Component)> {
        self.current().await.update_component(id, update).await
    }

    async fn remove_component(&self, id: &ComponentId) -> Result<(Component, Vec<Dependency>)> {
        self.current().await.remove_component(id).await
    }

    async fn list(&self, filter: &ComponentFilter) -> Result<Vec<Component>> {
        self.current().await.list(filter).await
    }

    async fn add_dependency(
        &self,
        dependency: NewDependency,
        deadline: Deadline,
    ) -> Result<Dependency> {
        self.current().await.add_dependency(dependency, deadline).await
    }

    async fn remove_dependency(
        &self,
        from: &ComponentId,
        to: &ComponentId,
        dep_type: DependencyType,
    ) -> Result<Dependency> {
        self.current()
            .await
            .remove_dependency(from, to, dep_type)
            .await
    }

    async fn dependencies(&self, id: &ComponentId) -> Result<Vec<Dependency>> {
        self.current().await.dependencies(id).await
    }

    async fn dependents(&self, id: &ComponentId) -> Result<Vec<Dependency>> {
        self.current().await.dependents(id).await
    }

    async fn has_cycle(
        &self,
        from: &ComponentId,
        to: &ComponentId,
        deadline: Deadline,
    ) -> Result<bool> {
        self.current().await.has_cycle(from, to, deadline).await
    }

    async fn reachable(
        &self,
        id: &ComponentId,
        direction: TraversalDirection,
        deadline: Deadline,
    ) -> Result<Vec<Component>> {
        self.current()
            .await
            .reachable(id, direction, deadline)
            .await
    }

    async fn find_path(
        &self,
        from: &ComponentId,
        to: &ComponentId,
        deadline: Deadline,
    ) -> Result<Option<DependencyPath>> {
        self.current().await.find_path(from, to, deadline).await
    }

    async fn dependent_layers(
        &self,
        id: &ComponentId,
        max_depth: Option<usize>,
        min_strength: DependencyStrength,
        deadline: Deadline,
    ) -> Result<LayeredWalk> {
        self.current()
            .await
            .dependent_layers(id, max_depth, min_strength, deadline)
            .await
    }

    async fn dependency_walk(
        &self,
        roots: &[ComponentId],
        project_id: Option<&str>,
        max_hops: Option<usize>,
        deadline: Deadline,
    ) -> Result<Vec<WalkEntry>> {
        self.current()
            .await
            .dependency_walk(roots, project_id, max_hops, deadline)
            .await
    }

    async fn export(&self) -> Result<(Vec<Component>, Vec<Dependency>)> {
        self.current().await.export().await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.current().await.stats().await
    }

    async fn save(&self) -> Result<()> {
        let store = self.current().await;
        save_snapshot(store.as_ref(), &self.path)
            .await
            .map_err(|e| unavailable(&self.path, &e))
    }

    async fn reload(&self) -> Result<()> {
        let fresh = open_snapshot(&self.path).await?;
        *self.inner.write().await = fresh;
        Ok(())
    }
}

/// Create a store for the given backend.
///
/// # Example
///
/// ```no_run
/// use ripple::storage::{create_store, StoreBackend};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> anyhow::Result<()> {
///     let store = create_store(StoreBackend::InMemory).await?;
///     // Use store...
///     Ok(())
/// }
/// ```
///
/// # Errors
///
/// `Error::StoreUnavailable` if an existing snapshot file cannot be read.
pub async fn create_store(backend: StoreBackend) -> Result<Arc<dyn GraphStore>> {
    match backend {
        StoreBackend::InMemory => Ok(in_memory::new_in_memory_store()),
        StoreBackend::Snapshot(path) => {
            let inner = open_snapshot(&path).await?;
            Ok(Arc::new(SnapshotBackedStore {
                inner: RwLock::new(inner),
                path,
            }))
        }
    }
}
