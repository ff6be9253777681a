//! Dependency Manager: validated edge mutations and graph queries.
//!
//! Every edge mutation goes through the store's single write-locked call, so
//! the self-loop, duplicate and cycle checks run atomically with the commit.
//! On success a [`DependencyEvent`] is published; on rejection nothing is
//! committed and nothing is published. The cycle check is bounded by the
//! mutation timeout so a large reachable subgraph cannot hold the write lock
//! indefinitely.

use crate::domain::{
    Component, ComponentId, Dependency, DependencyPath, DependencyType, NewDependency,
};
use crate::error::Result;
use crate::events::{DependencyChange, DependencyEvent, EventSink, publish_or_log};
use crate::storage::{Deadline, GraphStore, TraversalDirection};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Validates and applies edge additions and removals.
#[derive(Clone)]
pub struct DependencyManager {
    store: Arc<dyn GraphStore>,
    events: Arc<dyn EventSink>,
    mutation_timeout: Duration,
}

impl std::fmt::Debug for DependencyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyManager").finish_non_exhaustive()
    }
}

impl DependencyManager {
    /// Create a manager over a shared store and event sink.
    ///
    /// `mutation_timeout` bounds the cycle check of every edge insertion.
    pub fn new(
        store: Arc<dyn GraphStore>,
        events: Arc<dyn EventSink>,
        mutation_timeout: Duration,
    ) -> Self {
        Self {
            store,
            events,
            mutation_timeout,
        }
    }

    /// Deadline for the cycle check of a mutation starting now.
    pub fn mutation_deadline(&self) -> Deadline {
        Deadline::after(self.mutation_timeout)
    }

    /// Add a `STRONG` edge `source -> target`.
    ///
    /// # Errors
    ///
    /// - `ComponentNotFound` if either endpoint is missing
    /// - `SelfDependency` if `source == target`
    /// - `DependencyConflict` if the same `(source, target, type)` edge exists
    /// - `CircularDependency` if `target` already reaches `source`
    /// - `CycleCheckTimeout` if the cycle check outlives the mutation timeout
    pub async fn add_dependency(
        &self,
        source: &ComponentId,
        target: &ComponentId,
        dep_type: DependencyType,
    ) -> Result<Dependency> {
        self.add(NewDependency::new(source.clone(), target.clone(), dep_type))
            .await
    }

    /// Add a fully specified edge (strength and metadata included).
    pub async fn add(&self, new: NewDependency) -> Result<Dependency> {
        debug!(source = %new.source, target = %new.target, dep_type = %new.dep_type, "Adding dependency");

        let (source, target) = (new.source.clone(), new.target.clone());
        let dependency = self
            .store
            .add_dependency(new, self.mutation_deadline())
            .await
            .inspect_err(|e| warn!(%source, %target, error = %e, "Dependency rejected"))?;

        info!(dependency = %dependency, "Dependency added");
        publish_or_log(
            self.events.as_ref(),
            DependencyEvent::new(
                DependencyChange::Added,
                dependency.source.clone(),
                dependency.target.clone(),
                dependency.dep_type,
            ),
        )
        .await;

        Ok(dependency)
    }

    /// Remove the edge matching `(source, target, type)`.
    ///
    /// # Errors
    ///
    /// - `ComponentNotFound` if either endpoint is missing
    /// - `DependencyNotFound` if no such edge exists
    pub async fn remove_dependency(
        &self,
        source: &ComponentId,
        target: &ComponentId,
        dep_type: DependencyType,
    ) -> Result<Dependency> {
        let dependency = self
            .store
            .remove_dependency(source, target, dep_type)
            .await
            .inspect_err(|e| warn!(%source, %target, error = %e, "Dependency removal rejected"))?;

        info!(dependency = %dependency, "Dependency removed");
        publish_or_log(
            self.events.as_ref(),
            DependencyEvent::new(
                DependencyChange::Removed,
                dependency.source.clone(),
                dependency.target.clone(),
                dependency.dep_type,
            ),
        )
        .await;

        Ok(dependency)
    }

    /// Outgoing edges: what `id` requires.
    pub async fn direct_dependencies(&self, id: &ComponentId) -> Result<Vec<Dependency>> {
        debug!(component_id = %id, "Getting direct dependencies");
        self.store.dependencies(id).await
    }

    /// Incoming edges: what requires `id`.
    pub async fn direct_dependents(&self, id: &ComponentId) -> Result<Vec<Dependency>> {
        debug!(component_id = %id, "Getting direct dependents");
        self.store.dependents(id).await
    }

    /// Distinct ids of components with an edge pointing at `id`, sorted.
    pub async fn direct_dependent_ids(&self, id: &ComponentId) -> Result<Vec<ComponentId>> {
        let mut ids: Vec<ComponentId> = self
            .store
            .dependents(id)
            .await?
            .into_iter()
            .map(|dep| dep.source)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Transitive closure over dependencies, `id` excluded.
    pub async fn all_dependencies(
        &self,
        id: &ComponentId,
        deadline: Deadline,
    ) -> Result<Vec<Component>> {
        debug!(component_id = %id, "Getting transitive dependencies");
        self.store
            .reachable(id, TraversalDirection::Dependencies, deadline)
            .await
    }

    /// Transitive closure over dependents, `id` excluded.
    pub async fn all_dependents(
        &self,
        id: &ComponentId,
        deadline: Deadline,
    ) -> Result<Vec<Component>> {
        debug!(component_id = %id, "Getting transitive dependents");
        self.store
            .reachable(id, TraversalDirection::Dependents, deadline)
            .await
    }

    /// First discovered path `source -> ... -> target`, or `None`.
    pub async fn find_dependency_path(
        &self,
        source: &ComponentId,
        target: &ComponentId,
        deadline: Deadline,
    ) -> Result<Option<DependencyPath>> {
        debug!(%source, %target, "Finding dependency path");
        self.store.find_path(source, target, deadline).await
    }

    /// Check whether `source -> target` would close a cycle, without adding it.
    pub async fn would_create_cycle(
        &self,
        source: &ComponentId,
        target: &ComponentId,
        deadline: Deadline,
    ) -> Result<bool> {
        self.store.has_cycle(source, target, deadline).await
    }
}
