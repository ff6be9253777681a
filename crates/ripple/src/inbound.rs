//! Inbound event streams.
//!
//! [`EventProcessor`] turns records from the three inbound streams into
//! registry, dependency and propagation calls:
//!
//! - **Change events** ([`ComponentUpdateEvent`]): create, update, delete,
//!   version change, configuration change and dependency change
//! - **Generation requests** ([`GenerationRequest`]): batches of component
//!   definitions registered as one unit
//! - **Validation results** ([`ValidationResult`]): continue or roll back
//!   propagation to dependents
//!
//! Delivery is at-least-once. A bounded set of processed event ids turns a
//! redelivered update, delete or dependency change into a logged no-op. A
//! redelivered create is deliberately *not* short-circuited: it reaches the
//! store and fails with `DuplicateComponent`, leaving the stored component
//! unchanged.

use crate::dependency::DependencyManager;
use crate::domain::{
    Component, ComponentId, ComponentStatus, ComponentType, ComponentUpdate, Dependency,
    DependencyStrength, DependencyType, Metadata, NewComponent, NewDependency,
};
use crate::error::{Error, Result};
use crate::propagation::{ChangeDetails, PropagationEngine, PropagationOutcome};
use crate::registry::{ComponentRegistry, UpdateOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Version given to generated components that don't declare one.
pub const DEFAULT_GENERATED_VERSION: &str = "1.0.0";

/// Kind of change carried by a [`ComponentUpdateEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateType {
    /// Register a component
    Create,
    /// Partial update
    Update,
    /// Remove a component
    Delete,
    /// Version bump
    VersionChange,
    /// Add or remove an edge
    DependencyChange,
    /// Metadata-only update
    ConfigurationChange,
}

/// A record from the change-event stream.
///
/// `changes` is interpreted per update type:
///
/// | type                 | keys read from `changes`                              |
/// |----------------------|-------------------------------------------------------|
/// | CREATE               | `name`, `type`, `metadata`                            |
/// | UPDATE / VERSION_CHANGE / CONFIGURATION_CHANGE | `status`; every other key is merged into metadata |
/// | DEPENDENCY_CHANGE    | `action` (ADD/REMOVE), `target`, `type`, `strength`   |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentUpdateEvent {
    /// Unique id, used for duplicate detection
    pub event_id: String,
    /// Subject component
    pub component_id: ComponentId,
    /// Owning project
    pub project_id: String,
    /// What kind of change this is
    pub update_type: UpdateType,
    /// Version before the change
    #[serde(default)]
    pub previous_version: Option<String>,
    /// Version after the change
    #[serde(default)]
    pub new_version: Option<String>,
    /// Type-specific payload
    #[serde(default)]
    pub changes: Metadata,
    /// When the change happened upstream
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Who made the change
    #[serde(default)]
    pub user_id: Option<String>,
    /// Why
    #[serde(default)]
    pub reason: Option<String>,
}

/// One component in a [`GenerationRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// Explicit id; derived from `name` when absent
    #[serde(default)]
    pub id: Option<ComponentId>,
    /// Human readable name
    pub name: String,
    /// Kind of artifact
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    /// Initial version, `1.0.0` when absent
    #[serde(default)]
    pub version: Option<String>,
    /// Stored as the component's metadata
    #[serde(default)]
    pub configuration: Metadata,
    /// Ids this component depends on (RUNTIME edges)
    #[serde(default)]
    pub dependencies: Vec<ComponentId>,
}

impl ComponentDefinition {
    /// The id this definition registers under.
    pub fn component_id(&self) -> ComponentId {
        self.id.clone().unwrap_or_else(|| slugify(&self.name))
    }
}

/// A record from the generation-request stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Unique id of the request
    pub request_id: String,
    /// Project every definition belongs to
    pub project_id: String,
    /// Components to register as one unit
    #[serde(default)]
    pub components: Vec<ComponentDefinition>,
    /// Who asked
    #[serde(default)]
    pub user_id: Option<String>,
    /// When it was asked
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A record from the validation-result stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Validated component
    pub component_id: ComponentId,
    /// Whether validation passed
    pub valid: bool,
    /// Validation messages
    #[serde(default)]
    pub errors: Vec<String>,
    /// When validation finished
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Any inbound record, tagged by stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Change-event stream
    ComponentUpdate(ComponentUpdateEvent),
    /// Generation-request stream
    GenerationRequest(GenerationRequest),
    /// Validation-result stream
    ValidationResult(ValidationResult),
}

/// What processing an inbound record did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InboundOutcome {
    /// A component was registered
    Created {
        /// The new component
        component: Component,
    },
    /// A component was updated
    Updated {
        /// Update result, including any propagation
        update: UpdateOutcome,
    },
    /// A component was deleted
    Deleted {
        /// The removed component
        component: Component,
    },
    /// An edge was added
    DependencyAdded {
        /// The new edge
        dependency: Dependency,
    },
    /// An edge was removed
    DependencyRemoved {
        /// The removed edge
        dependency: Dependency,
    },
    /// A generation batch was registered
    Registered {
        /// Every registered component
        components: Vec<Component>,
    },
    /// A validation result was turned into propagation
    Propagated {
        /// The propagation run
        propagation: PropagationOutcome,
    },
    /// The event id was already processed
    Duplicate {
        /// The repeated event id
        event_id: String,
    },
    /// The record carried nothing to apply
    Ignored {
        /// Why it was ignored
        reason: String,
    },
}

/// Bounded FIFO set of processed event ids, plus the ids being applied.
#[derive(Debug)]
struct ProcessedIds {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
    in_flight: HashSet<String>,
}

impl ProcessedIds {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity.min(1024)),
            seen: HashSet::new(),
            in_flight: HashSet::new(),
        }
    }

    /// Claim `id` for applying. Fails if it was processed or is in flight.
    fn begin(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.in_flight.insert(id.to_string())
    }

    /// Release a claim, remembering the id only when it applied.
    fn finish(&mut self, id: &str, applied: bool) {
        self.in_flight.remove(id);
        if applied {
            self.insert(id.to_string());
        }
    }

    fn insert(&mut self, id: String) {
        if self.capacity == 0 || !self.seen.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }
}

/// Applies inbound records to the core.
pub struct EventProcessor {
    registry: ComponentRegistry,
    dependencies: DependencyManager,
    propagation: PropagationEngine,
    processed: Mutex<ProcessedIds>,
}

impl std::fmt::Debug for EventProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProcessor").finish_non_exhaustive()
    }
}

impl EventProcessor {
    /// Create a processor remembering up to `processed_cache` event ids.
    pub fn new(
        registry: ComponentRegistry,
        dependencies: DependencyManager,
        propagation: PropagationEngine,
        processed_cache: usize,
    ) -> Self {
        Self {
            registry,
            dependencies,
            propagation,
            processed: Mutex::new(ProcessedIds::new(processed_cache)),
        }
    }

    /// Dispatch a record from any stream.
    pub async fn process(&self, event: InboundEvent) -> Result<InboundOutcome> {
        match event {
            InboundEvent::ComponentUpdate(event) => self.handle_component_update(event).await,
            InboundEvent::GenerationRequest(request) => {
                self.handle_generation_request(request).await
            }
            InboundEvent::ValidationResult(result) => self.handle_validation_result(result).await,
        }
    }

    /// Apply a change event.
    ///
    /// A non-CREATE event whose id was already applied, or is being applied
    /// by a concurrent delivery, returns [`InboundOutcome::Duplicate`].
    ///
    /// # Errors
    ///
    /// Whatever the underlying registry or dependency call returns, plus
    /// `InvalidComponent` when `changes` lacks a required key.
    pub async fn handle_component_update(
        &self,
        event: ComponentUpdateEvent,
    ) -> Result<InboundOutcome> {
        info!(
            event_id = %event.event_id,
            component_id = %event.component_id,
            update_type = ?event.update_type,
            "Received component update event"
        );

        // CREATE redelivery must reach the registry to surface DuplicateComponent.
        let event_id = event.event_id.clone();
        let claimed = event.update_type != UpdateType::Create;
        if claimed && !self.processed.lock().await.begin(&event_id) {
            warn!(%event_id, "Skipping already processed event");
            return Ok(InboundOutcome::Duplicate { event_id });
        }

        let result = self.apply_component_update(event).await;

        let mut processed = self.processed.lock().await;
        if claimed {
            processed.finish(&event_id, result.is_ok());
        } else if result.is_ok() {
            processed.insert(event_id);
        }
        result
    }

    async fn apply_component_update(&self, event: ComponentUpdateEvent) -> Result<InboundOutcome> {
        match event.update_type {
            UpdateType::Create => self.apply_create(event).await,
            UpdateType::Update | UpdateType::VersionChange | UpdateType::ConfigurationChange => {
                self.apply_update(event).await
            }
            UpdateType::Delete => Ok(InboundOutcome::Deleted {
                component: self.registry.delete_component(&event.component_id).await?,
            }),
            UpdateType::DependencyChange => self.apply_dependency_change(event).await,
        }
    }

    /// Register a generation batch atomically.
    ///
    /// # Errors
    ///
    /// Any validation or store error; nothing is committed on failure.
    pub async fn handle_generation_request(
        &self,
        request: GenerationRequest,
    ) -> Result<InboundOutcome> {
        info!(
            request_id = %request.request_id,
            project_id = %request.project_id,
            components = request.components.len(),
            "Received generation request"
        );

        if request.components.is_empty() {
            return Ok(InboundOutcome::Ignored {
                reason: "generation request has no components".to_string(),
            });
        }

        let mut components = Vec::with_capacity(request.components.len());
        let mut dependencies = Vec::new();
        for definition in request.components {
            let id = definition.component_id();
            for target in definition.dependencies {
                dependencies.push(NewDependency::new(
                    id.clone(),
                    target,
                    DependencyType::Runtime,
                ));
            }

            let mut new = NewComponent::new(
                id,
                definition.name,
                definition.component_type,
                definition
                    .version
                    .unwrap_or_else(|| DEFAULT_GENERATED_VERSION.to_string()),
                request.project_id.clone(),
            );
            new.metadata = definition.configuration;
            components.push(new);
        }

        let components = self.registry.create_batch(components, dependencies).await?;
        Ok(InboundOutcome::Registered { components })
    }

    /// Continue or roll back propagation after validation.
    ///
    /// A passing result propagates SELECTIVE; a failing one propagates
    /// ROLLBACK carrying the validation errors.
    pub async fn handle_validation_result(
        &self,
        result: ValidationResult,
    ) -> Result<InboundOutcome> {
        info!(component_id = %result.component_id, valid = result.valid, "Received validation result");

        let mut change = if result.valid {
            ChangeDetails::default()
        } else {
            warn!(component_id = %result.component_id, errors = ?result.errors, "Validation failed");
            ChangeDetails::rollback()
        };
        change.details.insert("valid".into(), result.valid.into());
        if !result.errors.is_empty() {
            change.details.insert("errors".into(), result.errors.into());
        }

        let propagation = self
            .propagation
            .propagate(&result.component_id, change)
            .await?;
        Ok(InboundOutcome::Propagated { propagation })
    }

    async fn apply_create(&self, event: ComponentUpdateEvent) -> Result<InboundOutcome> {
        let mut changes = event.changes;

        let component_type = match changes.remove("type") {
            Some(value) => parse_field::<ComponentType>(&value, "type")?,
            None => {
                return Err(Error::InvalidComponent {
                    field: "type",
                    reason: "CREATE event is missing changes.type".to_string(),
                });
            }
        };
        let version = event.new_version.ok_or_else(|| Error::InvalidComponent {
            field: "new_version",
            reason: "CREATE event is missing new_version".to_string(),
        })?;
        let name = match changes.remove("name") {
            Some(Value::String(name)) => name,
            _ => event.component_id.to_string(),
        };

        let mut new = NewComponent::new(
            event.component_id,
            name,
            component_type,
            version,
            event.project_id,
        );
        if let Some(Value::Object(metadata)) = changes.remove("metadata") {
            new.metadata = metadata.into_iter().collect();
        }

        Ok(InboundOutcome::Created {
            component: self.registry.create_component(new).await?,
        })
    }

    async fn apply_update(&self, event: ComponentUpdateEvent) -> Result<InboundOutcome> {
        if event.update_type == UpdateType::VersionChange && event.new_version.is_none() {
            return Err(Error::InvalidComponent {
                field: "new_version",
                reason: "VERSION_CHANGE event is missing new_version".to_string(),
            });
        }

        let mut changes = event.changes;
        let status = changes
            .remove("status")
            .map(|value| parse_field::<ComponentStatus>(&value, "status"))
            .transpose()?;

        let update = ComponentUpdate {
            version: event.new_version,
            status,
            metadata: (!changes.is_empty()).then_some(changes),
        };

        if update.is_empty() {
            debug!(event_id = %event.event_id, "Update event carries no changes");
            return Ok(InboundOutcome::Ignored {
                reason: "update event carries no changes".to_string(),
            });
        }

        let update = self
            .registry
            .update_component(&event.component_id, update, event.user_id.as_deref())
            .await?;
        Ok(InboundOutcome::Updated { update })
    }

    async fn apply_dependency_change(&self, event: ComponentUpdateEvent) -> Result<InboundOutcome> {
        let changes = &event.changes;

        let action = match changes.get("action") {
            Some(Value::String(action)) => action.to_ascii_uppercase(),
            _ => {
                return Err(Error::InvalidComponent {
                    field: "action",
                    reason: "DEPENDENCY_CHANGE event is missing changes.action".to_string(),
                });
            }
        };
        let target = match changes.get("target") {
            Some(Value::String(target)) => ComponentId::new(target.as_str()),
            _ => {
                return Err(Error::InvalidComponent {
                    field: "target",
                    reason: "DEPENDENCY_CHANGE event is missing changes.target".to_string(),
                });
            }
        };
        let dep_type = match changes.get("type") {
            Some(value) => parse_field::<DependencyType>(value, "type")?,
            None => DependencyType::Compile,
        };

        match action.as_str() {
            "ADD" | "ADDED" => {
                let strength = match changes.get("strength") {
                    Some(value) => parse_field::<DependencyStrength>(value, "strength")?,
                    None => DependencyStrength::default(),
                };
                let dependency = self
                    .dependencies
                    .add(
                        NewDependency::new(event.component_id.clone(), target, dep_type)
                            .with_strength(strength),
                    )
                    .await?;
                Ok(InboundOutcome::DependencyAdded { dependency })
            }
            "REMOVE" | "REMOVED" => {
                let dependency = self
                    .dependencies
                    .remove_dependency(&event.component_id, &target, dep_type)
                    .await?;
                Ok(InboundOutcome::DependencyRemoved { dependency })
            }
            other => Err(Error::InvalidComponent {
                field: "action",
                reason: format!("unknown dependency action '{other}'"),
            }),
        }
    }
}

/// Parse a SCREAMING_SNAKE_CASE enum out of a JSON value.
fn parse_field<T: serde::de::DeserializeOwned>(value: &Value, field: &'static str) -> Result<T> {
    let normalized = match value {
        Value::String(s) => Value::String(s.trim().to_ascii_uppercase().replace('-', "_")),
        other => other.clone(),
    };
    serde_json::from_value(normalized).map_err(|e| Error::InvalidComponent {
        field,
        reason: e.to_string(),
    })
}

/// Derive an id from a display name: lowercase, runs of non-alphanumerics become `-`.
fn slugify(name: &str) -> ComponentId {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    ComponentId::new(slug)
}
