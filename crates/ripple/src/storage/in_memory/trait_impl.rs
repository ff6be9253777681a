//! GraphStore trait implementation for the in-memory store.

use super::InMemoryStore;
use super::graph::{bfs_layers, bounded_dfs, collect_reachable, find_path, would_create_cycle};
use crate::domain::{
    Component, ComponentFilter, ComponentId, ComponentUpdate, Dependency, DependencyPath,
    DependencyStrength, DependencyType, NewDependency,
};
use crate::error::{Error, Result};
use crate::storage::{
    Deadline, GraphStore, LayeredComponent, LayeredWalk, StoreStats, TraversalDirection,
    WalkEntry,
};
use async_trait::async_trait;
use petgraph::Direction;
use petgraph::visit::EdgeRef;

impl From<TraversalDirection> for Direction {
    fn from(direction: TraversalDirection) -> Self {
        match direction {
            TraversalDirection::Dependencies => Direction::Outgoing,
            TraversalDirection::Dependents => Direction::Incoming,
        }
    }
}

#[async_trait]
impl GraphStore for InMemoryStore {
    async fn insert_component(&self, component: Component) -> Result<Component> {
        let mut inner = self.write().await;
        inner.insert_component(component)
    }

    async fn insert_batch(
        &self,
        components: Vec<Component>,
        dependencies: Vec<NewDependency>,
        deadline: Deadline,
    ) -> Result<Vec<Component>> {
        let mut inner = self.write().await;
        inner.insert_batch(components, dependencies, deadline)
    }

    async fn get_component(&self, id: &ComponentId) -> Result<Option<Component>> {
        let inner = self.read().await;
        Ok(inner.components.get(id).cloned())
    }

    async fn update_component(
        &self,
        id: &ComponentId,
        update: &ComponentUpdate,
    ) -> Result<(Component, Component)> {
        let mut inner = self.write().await;
        inner.update_component(id, update)
    }

    async fn remove_component(&self, id: &ComponentId) -> Result<(Component, Vec<Dependency>)> {
        let mut inner = self.write().await;
        inner.remove_component(id)
    }

    async fn list(&self, filter: &ComponentFilter) -> Result<Vec<Component>> {
        let inner = self.read().await;
        let mut components: Vec<Component> = inner
            .components
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        components.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(components)
    }

    async fn add_dependency(
        &self,
        dependency: NewDependency,
        deadline: Deadline,
    ) -> Result<Dependency> {
        let mut inner = self.write().await;
        inner.add_dependency(dependency, deadline)
    }

    async fn remove_dependency(
        &self,
        from: &ComponentId,
        to: &ComponentId,
        dep_type: DependencyType,
    ) -> Result<Dependency> {
        let mut inner = self.write().await;
        inner.remove_dependency(from, to, dep_type)
    }

    async fn dependencies(&self, id: &ComponentId) -> Result<Vec<Dependency>> {
        let inner = self.read().await;
        let node = inner.node(id)?;
        let mut deps: Vec<Dependency> = inner
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| edge.weight().clone())
            .collect();
        deps.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(deps)
    }

    async fn dependents(&self, id: &ComponentId) -> Result<Vec<Dependency>> {
        let inner = self.read().await;
        let node = inner.node(id)?;
        let mut deps: Vec<Dependency> = inner
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| edge.weight().clone())
            .collect();
        deps.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(deps)
    }

    async fn has_cycle(
        &self,
        from: &ComponentId,
        to: &ComponentId,
        deadline: Deadline,
    ) -> Result<bool> {
        let inner = self.read().await;
        let from_node = inner.node(from)?;
        let to_node = inner.node(to)?;
        would_create_cycle(&inner.graph, from_node, to_node, deadline)
    }

    async fn reachable(
        &self,
        id: &ComponentId,
        direction: TraversalDirection,
        deadline: Deadline,
    ) -> Result<Vec<Component>> {
        let inner = self.read().await;
        let start = inner.node(id)?;
        let nodes = collect_reachable(&inner.graph, start, direction.into(), deadline)?;
        Ok(nodes
            .into_iter()
            .filter_map(|node| inner.component_at(node).cloned())
            .collect())
    }

    async fn find_path(
        &self,
        from: &ComponentId,
        to: &ComponentId,
        deadline: Deadline,
    ) -> Result<Option<DependencyPath>> {
        let inner = self.read().await;
        let from_node = inner.node(from)?;
        let to_node = inner.node(to)?;

        let Some(edges) = find_path(&inner.graph, from_node, to_node, deadline)? else {
            return Ok(None);
        };

        let edges = edges
            .into_iter()
            .map(|edge| {
                inner
                    .graph
                    .edge_weight(edge)
                    .cloned()
                    .ok_or_else(|| Error::internal("path edge missing from graph"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(DependencyPath { edges }))
    }

    async fn dependent_layers(
        &self,
        id: &ComponentId,
        max_depth: Option<usize>,
        min_strength: DependencyStrength,
        deadline: Deadline,
    ) -> Result<LayeredWalk> {
        let inner = self.read().await;
        let start = inner.node(id)?;
        let layers = bfs_layers(
            &inner.graph,
            start,
            Direction::Incoming,
            max_depth,
            min_strength,
            deadline,
        )?;

        let entries = layers
            .entries
            .into_iter()
            .filter_map(|(node, depth)| {
                inner.component_at(node).map(|component| LayeredComponent {
                    component: component.clone(),
                    depth,
                })
            })
            .collect();

        Ok(LayeredWalk {
            entries,
            truncated: layers.truncated,
        })
    }

    async fn dependency_walk(
        &self,
        roots: &[ComponentId],
        project_id: Option<&str>,
        max_hops: Option<usize>,
        deadline: Deadline,
    ) -> Result<Vec<WalkEntry>> {
        let inner = self.read().await;

        // Unknown roots are skipped rather than failing the walk.
        let root_nodes: Vec<_> = roots
            .iter()
            .filter_map(|id| inner.node_map.get(id).copied())
            .collect();

        let in_scope = |node| {
            inner
                .component_at(node)
                .is_some_and(|c| project_id.is_none_or(|p| c.project_id == p))
        };

        let walk = bounded_dfs(&inner.graph, &root_nodes, max_hops, in_scope, deadline)?;

        Ok(walk
            .into_iter()
            .filter_map(|(node, hops, root)| {
                let component = inner.component_at(node)?.clone();
                let root = inner.graph.node_weight(root)?.clone();
                Some(WalkEntry {
                    component,
                    hops,
                    root,
                })
            })
            .collect())
    }

    async fn export(&self) -> Result<(Vec<Component>, Vec<Dependency>)> {
        let inner = self.read().await;
        Ok((inner.all_components(), inner.all_dependencies()))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let inner = self.read().await;
        Ok(inner.stats())
    }

    async fn save(&self) -> Result<()> {
        // No-op for in-memory storage
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        // No-op for in-memory storage
        Ok(())
    }
}
