//! Core in-memory graph data structures.
//!
//! This module contains the inner graph structure that holds all data
//! and is wrapped in `Arc<RwLock<>>` for thread safety. Every mutation here
//! validates first and commits last, so a returned error means nothing changed.

use super::graph::{edges_between, would_create_cycle};
use crate::domain::{
    Component, ComponentId, ComponentUpdate, Dependency, DependencyType, NewDependency,
};
use crate::error::{Error, Result};
use crate::storage::{Deadline, StoreStats};
use chrono::Utc;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// Inner graph structure (not thread-safe).
///
/// # Graph Representation
///
/// Components live in an arena keyed by id. The dependency graph is a
/// petgraph `StableDiGraph` whose nodes carry the `ComponentId` and whose
/// edges carry the full [`Dependency`] record, directed from **dependent to
/// dependency**. Both directions are index lookups over the same graph; no
/// component holds a reference to another.
///
/// `StableDiGraph` keeps node indices valid across removals, which keeps
/// `node_map` consistent after deletes.
#[derive(Debug, Clone, Default)]
pub(crate) struct GraphInner {
    /// Components indexed by ID for O(1) lookups
    pub(super) components: HashMap<ComponentId, Component>,

    /// Dependency graph. Edge direction: source (dependent) -> target (dependency).
    pub(super) graph: StableDiGraph<ComponentId, Dependency>,

    /// Mapping from ComponentId to graph NodeIndex.
    ///
    /// Every component in `self.components` has exactly one entry here.
    pub(super) node_map: HashMap<ComponentId, NodeIndex>,
}

impl GraphInner {
    /// Create a new empty graph
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Resolve a component id to its node.
    pub(super) fn node(&self, id: &ComponentId) -> Result<NodeIndex> {
        self.node_map
            .get(id)
            .copied()
            .ok_or_else(|| Error::ComponentNotFound(id.clone()))
    }

    pub(super) fn component_at(&self, node: NodeIndex) -> Option<&Component> {
        self.graph
            .node_weight(node)
            .and_then(|id| self.components.get(id))
    }

    pub(super) fn stats(&self) -> StoreStats {
        StoreStats {
            components: self.components.len(),
            dependencies: self.graph.edge_count(),
        }
    }

    /// Insert a component, rejecting duplicate ids.
    pub(super) fn insert_component(&mut self, component: Component) -> Result<Component> {
        if self.components.contains_key(&component.id) {
            return Err(Error::DuplicateComponent(component.id));
        }

        let node = self.graph.add_node(component.id.clone());
        self.node_map.insert(component.id.clone(), node);
        self.components
            .insert(component.id.clone(), component.clone());

        Ok(component)
    }

    /// Apply a partial update, returning `(previous, updated)`.
    pub(super) fn update_component(
        &mut self,
        id: &ComponentId,
        update: &ComponentUpdate,
    ) -> Result<(Component, Component)> {
        let component = self
            .components
            .get_mut(id)
            .ok_or_else(|| Error::ComponentNotFound(id.clone()))?;

        let previous = component.clone();
        component.apply_update(update, Utc::now());

        Ok((previous, component.clone()))
    }

    /// Ids of components with an edge pointing at `node`, deduplicated and sorted.
    pub(super) fn direct_dependent_ids(&self, node: NodeIndex) -> Vec<ComponentId> {
        let mut ids: Vec<ComponentId> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| self.graph[edge.source()].clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Remove a component that nothing depends on, along with its outgoing edges.
    pub(super) fn remove_component(
        &mut self,
        id: &ComponentId,
    ) -> Result<(Component, Vec<Dependency>)> {
        let node = self.node(id)?;

        let dependents = self.direct_dependent_ids(node);
        if !dependents.is_empty() {
            return Err(Error::DependentsExist {
                component_id: id.clone(),
                dependents,
            });
        }

        let removed_edges: Vec<Dependency> = self
            .graph
            .edges(node)
            .map(|edge| edge.weight().clone())
            .collect();

        // Removing the node drops every incident edge.
        self.graph.remove_node(node);
        self.node_map.remove(id);
        let component = self
            .components
            .remove(id)
            .ok_or_else(|| Error::ComponentNotFound(id.clone()))?;

        Ok((component, removed_edges))
    }

    /// Validate and insert an edge.
    ///
    /// Checks run in order: both endpoints exist, no self-loop, no identical
    /// `(source, target, type)` edge, and `target` does not already reach
    /// `source`.
    pub(super) fn add_dependency(
        &mut self,
        new: NewDependency,
        deadline: Deadline,
    ) -> Result<Dependency> {
        let from_node = self.node(&new.source)?;
        let to_node = self.node(&new.target)?;

        if from_node == to_node {
            return Err(Error::SelfDependency(new.source));
        }

        if edges_between(&self.graph, from_node, to_node).any(|dep| dep.dep_type == new.dep_type) {
            return Err(Error::DependencyConflict {
                message: format!(
                    "{} already depends on {} with type {}",
                    new.source, new.target, new.dep_type
                ),
                components: vec![new.source, new.target],
            });
        }

        let closes_cycle = would_create_cycle(&self.graph, from_node, to_node, deadline)
            .map_err(|e| match e {
                Error::DeadlineExceeded => Error::CycleCheckTimeout {
                    from: new.source.clone(),
                    to: new.target.clone(),
                },
                other => other,
            })?;
        if closes_cycle {
            return Err(Error::CircularDependency {
                from: new.source,
                to: new.target,
            });
        }

        let dependency = new.into_dependency(Utc::now());
        self.graph
            .add_edge(from_node, to_node, dependency.clone());

        Ok(dependency)
    }

    /// Remove the edge matching `(from, to, dep_type)`.
    pub(super) fn remove_dependency(
        &mut self,
        from: &ComponentId,
        to: &ComponentId,
        dep_type: DependencyType,
    ) -> Result<Dependency> {
        let from_node = self.node(from)?;
        let to_node = self.node(to)?;

        let edge = self
            .graph
            .edges(from_node)
            .find(|edge| edge.target() == to_node && edge.weight().dep_type == dep_type)
            .map(|edge| edge.id())
            .ok_or_else(|| Error::DependencyNotFound {
                from: from.clone(),
                to: to.clone(),
                dep_type,
            })?;

        self.graph
            .remove_edge(edge)
            .ok_or_else(|| Error::internal(format!("edge {from} -> {to} vanished during removal")))
    }

    /// Insert components and edges as a unit.
    ///
    /// Works on a copy of the graph and only replaces `self` once every
    /// insertion succeeded.
    pub(super) fn insert_batch(
        &mut self,
        components: Vec<Component>,
        dependencies: Vec<NewDependency>,
        deadline: Deadline,
    ) -> Result<Vec<Component>> {
        let mut staged = self.clone();

        let mut inserted = Vec::with_capacity(components.len());
        for component in components {
            inserted.push(staged.insert_component(component)?);
        }
        for dependency in dependencies {
            staged.add_dependency(dependency, deadline)?;
        }

        *self = staged;
        Ok(inserted)
    }

    /// Every edge in the graph, ordered by `(source, target, type)`.
    pub(super) fn all_dependencies(&self) -> Vec<Dependency> {
        let mut deps: Vec<Dependency> = self
            .graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_weight(edge).cloned())
            .collect();
        deps.sort_by(|a, b| a.key().cmp(&b.key()));
        deps
    }

    /// Every component, ordered by id.
    pub(super) fn all_components(&self) -> Vec<Component> {
        let mut components: Vec<Component> = self.components.values().cloned().collect();
        components.sort_by(|a, b| a.id.cmp(&b.id));
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComponentType, NewComponent};
    use std::time::Duration;

    fn graph_with(ids: &[&str]) -> GraphInner {
        let mut inner = GraphInner::new();
        let now = Utc::now();
        for id in ids {
            let new = NewComponent::new(*id, *id, ComponentType::Service, "1.0.0", "p");
            inner.insert_component(new.into_component(now)).unwrap();
        }
        inner
    }

    fn dep(from: &str, to: &str) -> NewDependency {
        NewDependency::new(from, to, DependencyType::Compile)
    }

    #[test]
    fn test_node_map_survives_removal() {
        let mut inner = graph_with(&["a", "b", "c"]);
        inner.add_dependency(dep("c", "b"), Deadline::none()).unwrap();

        inner.remove_component(&ComponentId::new("a")).unwrap();

        // Indices of the remaining nodes are still valid
        let c = inner.node(&ComponentId::new("c")).unwrap();
        let b = inner.node(&ComponentId::new("b")).unwrap();
        assert_eq!(inner.graph[c].as_str(), "c");
        assert_eq!(inner.graph[b].as_str(), "b");
        assert_eq!(inner.stats().dependencies, 1);
    }

    #[test]
    fn test_expired_cycle_check_commits_nothing() {
        let mut inner = graph_with(&["a", "b", "c"]);
        inner.add_dependency(dep("b", "c"), Deadline::none()).unwrap();

        let err = inner
            .add_dependency(dep("a", "b"), Deadline::after(Duration::ZERO))
            .unwrap_err();

        assert!(matches!(
            err,
            Error::CycleCheckTimeout { ref from, ref to }
                if from.as_str() == "a" && to.as_str() == "b"
        ));
        assert_eq!(inner.stats().dependencies, 1);
    }

    #[test]
    fn test_expired_batch_commits_nothing() {
        let mut inner = graph_with(&["a"]);
        let now = Utc::now();
        let batch =
            vec![NewComponent::new("b", "b", ComponentType::Service, "1.0.0", "p").into_component(now)];

        let err = inner
            .insert_batch(batch, vec![dep("a", "b")], Deadline::after(Duration::ZERO))
            .unwrap_err();

        assert!(matches!(err, Error::CycleCheckTimeout { .. }));
        assert_eq!(inner.stats().components, 1);
        assert_eq!(inner.stats().dependencies, 0);
    }

    #[test]
    fn test_same_pair_different_types_allowed() {
        let mut inner = graph_with(&["a", "b"]);
        inner.add_dependency(dep("a", "b"), Deadline::none()).unwrap();
        inner
            .add_dependency(
                NewDependency::new("a", "b", DependencyType::Runtime),
                Deadline::none(),
            )
            .unwrap();

        let err = inner.add_dependency(dep("a", "b"), Deadline::none()).unwrap_err();
        assert!(matches!(err, Error::DependencyConflict { ref components, .. } if components.len() == 2));
        assert_eq!(inner.stats().dependencies, 2);
    }

    #[test]
    fn test_failed_batch_commits_nothing() {
        let mut inner = graph_with(&["existing"]);
        let now = Utc::now();
        let batch = vec![
            NewComponent::new("x", "x", ComponentType::Api, "1.0.0", "p").into_component(now),
            NewComponent::new("y", "y", ComponentType::Api, "1.0.0", "p").into_component(now),
        ];
        let edges = vec![dep("x", "y"), dep("y", "missing")];

        let err = inner.insert_batch(batch, edges, Deadline::none()).unwrap_err();
        assert!(matches!(err, Error::ComponentNotFound(_)));
        assert_eq!(inner.stats(), StoreStats { components: 1, dependencies: 0 });
        assert!(!inner.node_map.contains_key(&ComponentId::new("x")));
    }

    #[test]
    fn test_remove_dependency_matches_type() {
        let mut inner = graph_with(&["a", "b"]);
        inner.add_dependency(dep("a", "b"), Deadline::none()).unwrap();

        let err = inner
            .remove_dependency(
                &ComponentId::new("a"),
                &ComponentId::new("b"),
                DependencyType::Test,
            )
            .unwrap_err();
        assert!(matches!(err, Error::DependencyNotFound { .. }));

        let removed = inner
            .remove_dependency(
                &ComponentId::new("a"),
                &ComponentId::new("b"),
                DependencyType::Compile,
            )
            .unwrap();
        assert_eq!(removed.dep_type, DependencyType::Compile);
        assert_eq!(inner.stats().dependencies, 0);
    }
}
