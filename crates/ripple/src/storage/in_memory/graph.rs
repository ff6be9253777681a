//! Dependency graph algorithms over the petgraph arena.
//!
//! This module provides the traversals used by the in-memory store:
//! - Cycle detection for a prospective edge
//! - Transitive closure in either direction
//! - First-discovered path between two components
//! - Depth-bounded BFS layers over dependents (propagation)
//! - Depth-bounded DFS over dependencies (impact analysis)
//!
//! Every walk keeps a visited set, so it terminates even on a graph that
//! already (incorrectly) contains a cycle, and checks its [`Deadline`] once
//! per visited node.

use crate::domain::{ComponentId, Dependency, DependencyStrength};
use crate::error::Result;
use crate::storage::Deadline;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};

/// The graph type shared by the in-memory store.
pub(super) type ComponentGraph = StableDiGraph<ComponentId, Dependency>;

/// Edges running directly from `from` to `to`.
pub(super) fn edges_between(
    graph: &ComponentGraph,
    from: NodeIndex,
    to: NodeIndex,
) -> impl Iterator<Item = &Dependency> {
    graph
        .edges(from)
        .filter(move |edge| edge.target() == to)
        .map(|edge| edge.weight())
}

/// Check whether adding `from -> to` would close a cycle.
///
/// Walks forward from `to` with an explicit stack and visited set; the edge
/// is unsafe if `from` is reachable. Cost is proportional to the subgraph
/// reachable from `to`, not the whole graph.
pub(super) fn would_create_cycle(
    graph: &ComponentGraph,
    from: NodeIndex,
    to: NodeIndex,
    deadline: Deadline,
) -> Result<bool> {
    if from == to {
        return Ok(true);
    }

    let mut visited = HashSet::new();
    let mut stack = vec![to];

    while let Some(node) = stack.pop() {
        if node == from {
            return Ok(true);
        }
        if !visited.insert(node) {
            continue;
        }
        deadline.check()?;

        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            if !visited.contains(&next) {
                stack.push(next);
            }
        }
    }

    Ok(false)
}

/// Every node reachable from `start` in `direction`, start excluded, in BFS order.
pub(super) fn collect_reachable(
    graph: &ComponentGraph,
    start: NodeIndex,
    direction: Direction,
    deadline: Deadline,
) -> Result<Vec<NodeIndex>> {
    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    let mut result = Vec::new();

    while let Some(node) = queue.pop_front() {
        deadline.check()?;
        for next in graph.neighbors_directed(node, direction) {
            if visited.insert(next) {
                result.push(next);
                queue.push_back(next);
            }
        }
    }

    Ok(result)
}

/// First discovered forward path from `from` to `to`.
///
/// BFS with a predecessor map, so the returned path is also a shortest one.
/// Returns `Some(vec![])` when `from == to`.
pub(super) fn find_path(
    graph: &ComponentGraph,
    from: NodeIndex,
    to: NodeIndex,
    deadline: Deadline,
) -> Result<Option<Vec<EdgeIndex>>> {
    if from == to {
        return Ok(Some(Vec::new()));
    }

    let mut predecessor: HashMap<NodeIndex, EdgeIndex> = HashMap::new();
    let mut visited = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);

    while let Some(node) = queue.pop_front() {
        deadline.check()?;
        for edge in graph.edges(node) {
            let next = edge.target();
            if !visited.insert(next) {
                continue;
            }
            predecessor.insert(next, edge.id());
            if next == to {
                return Ok(Some(unwind_path(graph, &predecessor, from, to)));
            }
            queue.push_back(next);
        }
    }

    Ok(None)
}

fn unwind_path(
    graph: &ComponentGraph,
    predecessor: &HashMap<NodeIndex, EdgeIndex>,
    from: NodeIndex,
    to: NodeIndex,
) -> Vec<EdgeIndex> {
    let mut edges = Vec::new();
    let mut current = to;
    while current != from {
        let Some(&edge) = predecessor.get(&current) else {
            break;
        };
        edges.push(edge);
        match graph.edge_endpoints(edge) {
            Some((source, _)) => current = source,
            None => break,
        }
    }
    edges.reverse();
    edges
}

/// Outcome of [`bfs_layers`].
#[derive(Debug, Default)]
pub(super) struct Layers {
    /// Reached nodes with their BFS layer, in visit order
    pub(super) entries: Vec<(NodeIndex, usize)>,
    /// `true` if `max_depth` cut off at least one unexplored edge
    pub(super) truncated: bool,
}

/// Breadth-first walk from `start` with layer numbers.
///
/// Only edges whose strength is at least `min_strength` are followed. Nodes
/// at `max_depth` are reported but not expanded.
pub(super) fn bfs_layers(
    graph: &ComponentGraph,
    start: NodeIndex,
    direction: Direction,
    max_depth: Option<usize>,
    min_strength: DependencyStrength,
    deadline: Deadline,
) -> Result<Layers> {
    let mut layers = Layers::default();
    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([(start, 0usize)]);

    while let Some((node, depth)) = queue.pop_front() {
        deadline.check()?;

        let mut edges = graph
            .edges_directed(node, direction)
            .filter(|edge| edge.weight().strength >= min_strength);

        if max_depth.is_some_and(|max| depth >= max) {
            let unexplored = edges.any(|edge| {
                let next = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                !visited.contains(&next)
            });
            layers.truncated |= unexplored;
            continue;
        }

        for edge in edges {
            let next = match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            };
            if visited.insert(next) {
                layers.entries.push((next, depth + 1));
                queue.push_back((next, depth + 1));
            }
        }
    }

    Ok(layers)
}

/// Depth-first walk over dependencies from each root, recording hop counts.
///
/// The visited set is shared across roots: a node reached from an earlier
/// root (or earlier in the same walk) is neither reported nor descended
/// again. Nodes beyond `max_hops` are not marked visited, so a later,
/// shorter route can still reach them. `admit` filters which nodes may be
/// visited at all.
pub(super) fn bounded_dfs(
    graph: &ComponentGraph,
    roots: &[NodeIndex],
    max_hops: Option<usize>,
    admit: impl Fn(NodeIndex) -> bool,
    deadline: Deadline,
) -> Result<Vec<(NodeIndex, usize, NodeIndex)>> {
    let mut visited = HashSet::new();
    let mut result = Vec::new();

    for &root in roots {
        let mut stack = vec![(root, 0usize)];

        while let Some((node, hops)) = stack.pop() {
            if max_hops.is_some_and(|max| hops > max) {
                continue;
            }
            if visited.contains(&node) || !admit(node) {
                continue;
            }
            deadline.check()?;
            visited.insert(node);
            result.push((node, hops, root));

            // Push in reverse so neighbors are visited in insertion order.
            let mut next: Vec<NodeIndex> = graph
                .neighbors_directed(node, Direction::Outgoing)
                .filter(|n| !visited.contains(n))
                .collect();
            next.reverse();
            stack.extend(next.into_iter().map(|n| (n, hops + 1)));
        }
    }

    Ok(result)
}
