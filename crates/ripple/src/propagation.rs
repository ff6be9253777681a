//! Propagation Engine: announce a change to every transitive dependent.
//!
//! A run walks dependents breadth-first from the changed component, bounded
//! by `max_propagation_depth` and a deadline. If anything was reached, one
//! [`PropagationRecord`] is published; if nothing was reached, nothing is
//! published.
//!
//! Depth is the BFS layer of the farthest reached dependent, i.e. the
//! shortest-path distance to the most distant one.

use crate::config::EngineConfig;
use crate::domain::{ComponentId, DependencyStrength, Metadata};
use crate::error::{Error, Result};
use crate::events::{
    EventSink, PropagationRecord, PropagationType, next_event_id, publish_or_log,
};
use crate::storage::{Deadline, GraphStore};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// What changed, as far as propagation cares.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetails {
    /// The component's version changed
    pub version_change: bool,
    /// The change is flagged as breaking
    pub breaking: bool,
    /// Downstream validation failed and dependents must revert
    pub rollback: bool,
    /// Follow only edges at least this strong (ignored for FORCED runs)
    pub min_strength: Option<DependencyStrength>,
    /// Who started the change; defaults to the configured initiator
    pub initiated_by: Option<String>,
    /// Free-form details copied onto the record
    pub details: Metadata,
}

impl ChangeDetails {
    /// A version change from `previous` to `new`.
    pub fn version_change(previous: &str, new: &str) -> Self {
        let mut details = Metadata::new();
        details.insert("previousVersion".into(), previous.into());
        details.insert("newVersion".into(), new.into());
        Self {
            version_change: true,
            details,
            ..Self::default()
        }
    }

    /// A change flagged as breaking.
    pub fn breaking() -> Self {
        Self {
            breaking: true,
            ..Self::default()
        }
    }

    /// Reverting dependents after a failed validation.
    pub fn rollback() -> Self {
        Self {
            rollback: true,
            ..Self::default()
        }
    }

    /// Set the initiator.
    #[must_use]
    pub fn initiated_by(mut self, initiator: impl Into<String>) -> Self {
        self.initiated_by = Some(initiator.into());
        self
    }

    /// Restrict propagation to edges of at least `strength`.
    #[must_use]
    pub fn with_min_strength(mut self, strength: DependencyStrength) -> Self {
        self.min_strength = Some(strength);
        self
    }

    /// Classify the run.
    ///
    /// Rollback wins, then version change (CASCADE), then breaking (FORCED);
    /// anything else is SELECTIVE.
    pub fn propagation_type(&self) -> PropagationType {
        if self.rollback {
            PropagationType::Rollback
        } else if self.version_change {
            PropagationType::Cascade
        } else if self.breaking {
            PropagationType::Forced
        } else {
            PropagationType::Selective
        }
    }

    fn effective_min_strength(&self) -> DependencyStrength {
        match self.propagation_type() {
            PropagationType::Forced => DependencyStrength::Optional,
            _ => self.min_strength.unwrap_or(DependencyStrength::Optional),
        }
    }
}

/// Result of one propagation run, returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropagationOutcome {
    /// Component whose change started the run
    pub trigger: ComponentId,
    /// Classification of the run
    pub propagation_type: PropagationType,
    /// Affected components in BFS order
    pub affected: Vec<ComponentId>,
    /// BFS layer of the farthest affected component (0 when none)
    pub depth: usize,
    /// `true` if `max_propagation_depth` cut the walk short
    pub truncated: bool,
    /// The published record; `None` when nothing was affected
    pub record: Option<PropagationRecord>,
}

impl PropagationOutcome {
    /// Returns `true` if a propagation record was emitted.
    pub fn emitted(&self) -> bool {
        self.record.is_some()
    }
}

/// Computes affected sets and emits propagation records.
#[derive(Clone)]
pub struct PropagationEngine {
    store: Arc<dyn GraphStore>,
    events: Arc<dyn EventSink>,
    timeout: Duration,
    max_depth: usize,
    default_initiator: String,
}

impl std::fmt::Debug for PropagationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropagationEngine")
            .field("timeout", &self.timeout)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl PropagationEngine {
    /// Create an engine using the propagation settings from `config`.
    pub fn new(
        store: Arc<dyn GraphStore>,
        events: Arc<dyn EventSink>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            events,
            timeout: config.propagation_timeout(),
            max_depth: config.max_propagation_depth,
            default_initiator: config.default_initiator.clone(),
        }
    }

    /// Propagate a change of `component_id` to its transitive dependents.
    ///
    /// # Errors
    ///
    /// - `ComponentNotFound` if the trigger doesn't exist
    /// - `PropagationTimeout` if the walk outlives the configured deadline
    /// - any store error, unretried
    pub async fn propagate(
        &self,
        component_id: &ComponentId,
        change: ChangeDetails,
    ) -> Result<PropagationOutcome> {
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let timed_out = || Error::PropagationTimeout {
            component_id: component_id.clone(),
            timeout_ms,
        };

        let deadline = Deadline::after(self.timeout);
        let outcome = tokio::time::timeout(self.timeout, self.run(component_id, change, deadline))
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| match e {
                Error::DeadlineExceeded => timed_out(),
                other => other,
            })?;

        if let Some(record) = &outcome.record {
            publish_or_log(self.events.as_ref(), record.clone()).await;
        }

        Ok(outcome)
    }

    async fn run(
        &self,
        component_id: &ComponentId,
        change: ChangeDetails,
        deadline: Deadline,
    ) -> Result<PropagationOutcome> {
        let trigger = self
            .store
            .get_component(component_id)
            .await?
            .ok_or_else(|| Error::ComponentNotFound(component_id.clone()))?;

        let propagation_type = change.propagation_type();
        let walk = self
            .store
            .dependent_layers(
                component_id,
                Some(self.max_depth),
                change.effective_min_strength(),
                deadline,
            )
            .await?;

        let depth = walk.max_depth();
        let affected: Vec<ComponentId> = walk
            .entries
            .into_iter()
            .map(|entry| entry.component.id)
            .collect();

        if affected.is_empty() {
            debug!(component_id = %component_id, %propagation_type, "No dependents; nothing to propagate");
            return Ok(PropagationOutcome {
                trigger: component_id.clone(),
                propagation_type,
                affected,
                depth: 0,
                truncated: false,
                record: None,
            });
        }

        let timestamp = Utc::now();
        let record = PropagationRecord {
            event_id: next_event_id("propagation", &[component_id.as_str()], timestamp),
            trigger_component_id: component_id.clone(),
            project_id: trigger.project_id,
            affected_component_ids: affected.clone(),
            propagation_type,
            update_details: change.details,
            propagation_depth: depth,
            truncated: walk.truncated,
            timestamp,
            initiated_by: change
                .initiated_by
                .unwrap_or_else(|| self.default_initiator.clone()),
        };

        info!(
            component_id = %component_id,
            %propagation_type,
            affected = affected.len(),
            depth,
            truncated = walk.truncated,
            "Propagated change"
        );

        Ok(PropagationOutcome {
            trigger: component_id.clone(),
            propagation_type,
            affected,
            depth,
            truncated: walk.truncated,
            record: Some(record),
        })
    }
}
