//! Component Registry: component lifecycle.
//!
//! The registry validates requests, commits them through the store, and then
//! publishes a lifecycle event. Version changes and breaking updates trigger
//! a synchronous propagation run before [`ComponentRegistry::update_component`]
//! returns.

use crate::dependency::DependencyManager;
use crate::domain::{
    Component, ComponentFilter, ComponentId, ComponentStatus, ComponentType, ComponentUpdate,
    NewComponent, NewDependency, validate_version,
};
use crate::error::{Error, Result};
use crate::events::{
    ComponentEvent, DependencyChange, DependencyEvent, EventSink, LifecycleChange,
    publish_or_log,
};
use crate::propagation::{ChangeDetails, PropagationEngine, PropagationOutcome};
use crate::storage::GraphStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of [`ComponentRegistry::update_component`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    /// The component after the update
    pub component: Component,
    /// Version before the update
    pub previous_version: String,
    /// Propagation triggered by the update, if any
    pub propagation: Option<PropagationOutcome>,
}

impl UpdateOutcome {
    /// Returns `true` if the update emitted a propagation record.
    pub fn propagated(&self) -> bool {
        self.propagation
            .as_ref()
            .is_some_and(PropagationOutcome::emitted)
    }
}

/// Owns component records and their lifecycle.
#[derive(Clone)]
pub struct ComponentRegistry {
    store: Arc<dyn GraphStore>,
    events: Arc<dyn EventSink>,
    dependencies: DependencyManager,
    propagation: PropagationEngine,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("propagation", &self.propagation)
            .finish_non_exhaustive()
    }
}

impl ComponentRegistry {
    /// Create a registry sharing the given store, sink and collaborators.
    pub fn new(
        store: Arc<dyn GraphStore>,
        events: Arc<dyn EventSink>,
        dependencies: DependencyManager,
        propagation: PropagationEngine,
    ) -> Self {
        Self {
            store,
            events,
            dependencies,
            propagation,
        }
    }

    /// Register a new component with status `ACTIVE`.
    ///
    /// # Errors
    ///
    /// - `InvalidComponent` if a field fails validation
    /// - `DuplicateComponent` if the id is taken (stored component untouched)
    pub async fn create_component(&self, new: NewComponent) -> Result<Component> {
        new.validate()
            .map_err(|(field, reason)| Error::InvalidComponent { field, reason })?;

        let component = self
            .store
            .insert_component(new.into_component(Utc::now()))
            .await
            .inspect_err(|e| warn!(error = %e, "Component creation rejected"))?;

        info!(component_id = %component.id, project_id = %component.project_id, "Component created");
        publish_or_log(
            self.events.as_ref(),
            ComponentEvent::new(
                LifecycleChange::Create,
                component.id.clone(),
                component.project_id.clone(),
                None,
                Some(component.version.clone()),
            ),
        )
        .await;

        Ok(component)
    }

    /// Register components and the edges between them as one unit.
    ///
    /// Edges may point at components of the same batch or at components
    /// already stored. Either everything is committed or nothing is.
    ///
    /// # Errors
    ///
    /// - `InvalidComponent` if any definition fails validation
    /// - any error `create_component` or `add_dependency` would raise for a
    ///   single member of the batch
    pub async fn create_batch(
        &self,
        components: Vec<NewComponent>,
        dependencies: Vec<NewDependency>,
    ) -> Result<Vec<Component>> {
        for new in &components {
            new.validate()
                .map_err(|(field, reason)| Error::InvalidComponent { field, reason })?;
        }

        let now = Utc::now();
        let staged = components
            .into_iter()
            .map(|new| new.into_component(now))
            .collect();
        let edges: Vec<(ComponentId, ComponentId, _)> = dependencies
            .iter()
            .map(|d| (d.source.clone(), d.target.clone(), d.dep_type))
            .collect();

        let created = self
            .store
            .insert_batch(staged, dependencies, self.dependencies.mutation_deadline())
            .await
            .inspect_err(|e| warn!(error = %e, "Batch registration rejected"))?;

        info!(components = created.len(), dependencies = edges.len(), "Batch registered");
        for component in &created {
            publish_or_log(
                self.events.as_ref(),
                ComponentEvent::new(
                    LifecycleChange::Create,
                    component.id.clone(),
                    component.project_id.clone(),
                    None,
                    Some(component.version.clone()),
                ),
            )
            .await;
        }
        for (source, target, dep_type) in edges {
            publish_or_log(
                self.events.as_ref(),
                DependencyEvent::new(DependencyChange::Added, source, target, dep_type),
            )
            .await;
        }

        Ok(created)
    }

    /// Apply a partial update.
    ///
    /// A changed version or a truthy `breakingChange` metadata flag triggers
    /// propagation before this returns. Propagation failures are returned to
    /// the caller; the update itself stays committed.
    ///
    /// # Errors
    ///
    /// - `InvalidComponent` for an empty update, a bad version, or status `DELETED`
    /// - `ComponentNotFound` if the component doesn't exist
    /// - `PropagationTimeout` if the triggered propagation outlives its deadline
    pub async fn update_component(
        &self,
        id: &ComponentId,
        update: ComponentUpdate,
        initiated_by: Option<&str>,
    ) -> Result<UpdateOutcome> {
        validate_update(&update)?;

        let (previous, component) = self
            .store
            .update_component(id, &update)
            .await
            .inspect_err(|e| warn!(component_id = %id, error = %e, "Component update rejected"))?;

        let version_changed = previous.version != component.version;
        info!(
            component_id = %id,
            previous_version = %previous.version,
            new_version = %component.version,
            "Component updated"
        );

        let change = if version_changed {
            LifecycleChange::VersionChange
        } else {
            LifecycleChange::Update
        };
        publish_or_log(
            self.events.as_ref(),
            ComponentEvent::new(
                change,
                component.id.clone(),
                component.project_id.clone(),
                Some(previous.version.clone()),
                Some(component.version.clone()),
            ),
        )
        .await;

        let breaking = update.is_breaking();
        let propagation = if version_changed || breaking {
            let mut details = if version_changed {
                ChangeDetails::version_change(&previous.version, &component.version)
            } else {
                ChangeDetails::default()
            };
            details.breaking = breaking;
            if let Some(initiator) = initiated_by {
                details = details.initiated_by(initiator);
            }
            Some(self.propagation.propagate(id, details).await?)
        } else {
            None
        };

        Ok(UpdateOutcome {
            component,
            previous_version: previous.version,
            propagation,
        })
    }

    /// Delete a component nothing depends on.
    ///
    /// Its outgoing edges are removed with it.
    ///
    /// # Errors
    ///
    /// - `ComponentNotFound` if the component doesn't exist
    /// - `DependentsExist` listing every direct dependent
    pub async fn delete_component(&self, id: &ComponentId) -> Result<Component> {
        // Early, friendly rejection; the store re-checks under its write lock.
        let dependents = self.dependencies.direct_dependent_ids(id).await?;
        if !dependents.is_empty() {
            warn!(component_id = %id, dependents = dependents.len(), "Deletion blocked by dependents");
            return Err(Error::DependentsExist {
                component_id: id.clone(),
                dependents,
            });
        }

        let (component, removed_edges) = self.store.remove_component(id).await?;

        info!(component_id = %id, removed_edges = removed_edges.len(), "Component deleted");
        publish_or_log(
            self.events.as_ref(),
            ComponentEvent::new(
                LifecycleChange::Delete,
                component.id.clone(),
                component.project_id.clone(),
                Some(component.version.clone()),
                None,
            ),
        )
        .await;

        Ok(component)
    }

    /// Get a component by id.
    pub async fn get_component(&self, id: &ComponentId) -> Result<Option<Component>> {
        debug!(component_id = %id, "Getting component");
        self.store.get_component(id).await
    }

    /// Every component of a project, ordered by id.
    pub async fn list_by_project(&self, project_id: &str) -> Result<Vec<Component>> {
        self.list(&ComponentFilter {
            project_id: Some(project_id.to_string()),
            ..ComponentFilter::default()
        })
        .await
    }

    /// Every component of a type, ordered by id.
    pub async fn list_by_type(&self, component_type: ComponentType) -> Result<Vec<Component>> {
        self.list(&ComponentFilter {
            component_type: Some(component_type),
            ..ComponentFilter::default()
        })
        .await
    }

    /// Components matching an arbitrary filter, ordered by id.
    pub async fn list(&self, filter: &ComponentFilter) -> Result<Vec<Component>> {
        debug!(?filter, "Listing components");
        self.store.list(filter).await
    }
}

fn validate_update(update: &ComponentUpdate) -> Result<()> {
    if update.is_empty() {
        return Err(Error::InvalidComponent {
            field: "update",
            reason: "no fields to update".to_string(),
        });
    }
    if let Some(version) = &update.version {
        validate_version(version).map_err(|reason| Error::InvalidComponent {
            field: "version",
            reason,
        })?;
    }
    if update.status == Some(ComponentStatus::Deleted) {
        return Err(Error::InvalidComponent {
            field: "status",
            reason: "use delete to remove a component".to_string(),
        });
    }
    Ok(())
}
