//! JSON Lines snapshots of the in-memory store.
//!
//! Each line holds one component together with its outgoing edges:
//!
//! ```text
//! {"id":"web","name":"Web","type":"FRONTEND",...,"dependencies":[{"source":"web","target":"api",...}]}
//! ```
//!
//! Lines are written sorted by component id and edges by `(target, type)`, so
//! saving an unchanged graph produces an identical file.

use super::graph::{edges_between, would_create_cycle};
use super::inner::GraphInner;
use super::InMemoryStore;
use crate::domain::{
    Component, ComponentId, Dependency, DependencyType, validate_component_id, validate_version,
};
use crate::error::Result;
use crate::storage::{Deadline, GraphStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::RwLock;

/// One line of a snapshot file.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    #[serde(flatten)]
    component: Component,

    #[serde(default)]
    dependencies: Vec<Dependency>,
}

/// Non-fatal problems found while loading a snapshot.
///
/// Loading continues past each of these; the offending line or edge is
/// skipped and the rest of the graph is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// Line could not be parsed as a component record
    ///
    /// **Effect**: the line is skipped entirely.
    MalformedJson {
        /// 1-based line number
        line_number: usize,
        /// Parser message
        error: String,
    },

    /// Component failed field validation (bad id or version)
    ///
    /// **Effect**: the component and its edges are skipped.
    InvalidComponent {
        /// Offending component
        component_id: ComponentId,
        /// 1-based line number
        line_number: usize,
        /// Validation message
        error: String,
    },

    /// A second record used an id that was already loaded
    ///
    /// **Effect**: the later record is skipped; the first one wins.
    DuplicateComponent {
        /// Repeated id
        component_id: ComponentId,
        /// 1-based line number of the skipped record
        line_number: usize,
    },

    /// Edge references a component that isn't in the file
    ///
    /// **Effect**: the edge is skipped.
    OrphanedDependency {
        /// Dependent
        from: ComponentId,
        /// Missing dependency
        to: ComponentId,
    },

    /// Edge repeats an existing `(source, target, type)` triple
    ///
    /// **Effect**: the repeat is skipped.
    DuplicateDependency {
        /// Dependent
        from: ComponentId,
        /// Dependency
        to: ComponentId,
        /// Repeated type
        dep_type: DependencyType,
    },

    /// Edge would close a cycle (or is a self-loop)
    ///
    /// **Effect**: the edge is skipped to break the cycle.
    CircularDependency {
        /// Dependent
        from: ComponentId,
        /// Dependency
        to: ComponentId,
    },
}

/// Load a store from a snapshot file.
///
/// # Error Handling
///
/// Problems with individual lines or edges become [`LoadWarning`]s. Only
/// failures to read the file itself are returned as errors.
///
/// # Loading passes
///
/// 1. Parse each line, skipping malformed ones
/// 2. Validate and insert components; the first record per id wins
/// 3. Insert edges, skipping orphans, repeats and cycle-closing edges
///
/// Edges are attached to the record that carries them: an edge's `source` is
/// always the id of its line's component.
pub async fn load_snapshot(path: &Path) -> Result<(Arc<dyn GraphStore>, Vec<LoadWarning>)> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut warnings = Vec::new();
    let mut records = Vec::new();
    let mut line_number = 0;

    // First pass: parse
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<SnapshotRecord>(&line) {
            Ok(record) => records.push((line_number, record)),
            Err(e) => warnings.push(LoadWarning::MalformedJson {
                line_number,
                error: e.to_string(),
            }),
        }
    }

    // Second pass: components
    let mut inner = GraphInner::new();
    let mut accepted = Vec::with_capacity(records.len());
    for (line_number, record) in records {
        let component = &record.component;
        let validation = validate_component_id(&component.id)
            .and_then(|()| validate_version(&component.version));
        if let Err(error) = validation {
            warnings.push(LoadWarning::InvalidComponent {
                component_id: component.id.clone(),
                line_number,
                error,
            });
            continue;
        }
        if inner.components.contains_key(&component.id) {
            warnings.push(LoadWarning::DuplicateComponent {
                component_id: component.id.clone(),
                line_number,
            });
            continue;
        }

        let node = inner.graph.add_node(component.id.clone());
        inner.node_map.insert(component.id.clone(), node);
        inner
            .components
            .insert(component.id.clone(), component.clone());
        accepted.push(record);
    }

    // Third pass: edges
    for record in accepted {
        let owner = record.component.id;
        for mut dep in record.dependencies {
            dep.source = owner.clone();

            let Some(&to_node) = inner.node_map.get(&dep.target) else {
                warnings.push(LoadWarning::OrphanedDependency {
                    from: dep.source,
                    to: dep.target,
                });
                continue;
            };
            let from_node = inner.node_map[&owner];

            if edges_between(&inner.graph, from_node, to_node).any(|e| e.dep_type == dep.dep_type) {
                warnings.push(LoadWarning::DuplicateDependency {
                    from: dep.source,
                    to: dep.target,
                    dep_type: dep.dep_type,
                });
                continue;
            }

            if would_create_cycle(&inner.graph, from_node, to_node, Deadline::none())? {
                warnings.push(LoadWarning::CircularDependency {
                    from: dep.source,
                    to: dep.target,
                });
                continue;
            }

            inner.graph.add_edge(from_node, to_node, dep);
        }
    }

    let store: InMemoryStore = Arc::new(RwLock::new(inner));
    let store: Arc<dyn GraphStore> = Arc::new(store);
    Ok((store, warnings))
}

/// Save a store to a snapshot file with an atomic write.
///
/// Writes to a temporary file next to `path` and renames it into place, so an
/// interrupted save leaves the previous snapshot intact.
pub async fn save_snapshot(store: &dyn GraphStore, path: &Path) -> Result<()> {
    let (components, dependencies) = store.export().await?;

    let mut outgoing: BTreeMap<ComponentId, Vec<Dependency>> = BTreeMap::new();
    for dep in dependencies {
        outgoing.entry(dep.source.clone()).or_default().push(dep);
    }

    let temp_path = path.with_extension("tmp");
    let file = File::create(&temp_path).await?;
    let mut writer = BufWriter::new(file);

    for component in components {
        let mut deps = outgoing.remove(&component.id).unwrap_or_default();
        deps.sort_by(|a, b| a.key().cmp(&b.key()));

        let record = SnapshotRecord {
            component,
            dependencies: deps,
        };
        let json = serde_json::to_string(&record)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    writer.flush().await?;
    tokio::fs::rename(&temp_path, path).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComponentType, NewComponent, NewDependency};
    use crate::storage::in_memory::new_in_memory_store;
    use chrono::Utc;
    use tempfile::TempDir;

    async fn sample_store() -> Arc<dyn GraphStore> {
        let store = new_in_memory_store();
        let now = Utc::now();
        for id in ["web", "api", "db"] {
            let new = NewComponent::new(id, id.to_uppercase(), ComponentType::Service, "1.0.0", "shop");
            store.insert_component(new.into_component(now)).await.unwrap();
        }
        store
            .add_dependency(
                NewDependency::new("web", "api", DependencyType::ApiCall),
                Deadline::none(),
            )
            .await
            .unwrap();
        store
            .add_dependency(
                NewDependency::new("api", "db", DependencyType::Database),
                Deadline::none(),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_save_then_load_preserves_graph() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("graph.jsonl");

        let store = sample_store().await;
        save_snapshot(store.as_ref(), &path).await.unwrap();

        let (loaded, warnings) = load_snapshot(&path).await.unwrap();
        assert!(warnings.is_empty());
        assert_eq!(loaded.export().await.unwrap(), store.export().await.unwrap());
    }

    #[tokio::test]
    async fn test_save_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("a.jsonl");
        let second = temp_dir.path().join("b.jsonl");

        let store = sample_store().await;
        save_snapshot(store.as_ref(), &first).await.unwrap();
        save_snapshot(store.as_ref(), &second).await.unwrap();

        let a = tokio::fs::read_to_string(&first).await.unwrap();
        let b = tokio::fs::read_to_string(&second).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_snapshot(&temp_dir.path().join("nope.jsonl")).await;
        assert!(result.is_err());
    }
}
