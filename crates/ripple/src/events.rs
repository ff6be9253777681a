//! Outbound events and the event boundary.
//!
//! Every committed mutation and every propagation or analysis run produces an
//! [`OutboundEvent`]. Events are handed to an [`EventSink`] after the
//! operation has already succeeded; a failed publish is logged and never
//! changes the operation's result. Delivery guarantees beyond the hand-off are
//! the sink's business.
//!
//! # Sinks
//!
//! - [`ChannelSink`]: bounded tokio `mpsc` channel, never blocks the publisher
//! - [`NullSink`]: discards everything
//! - [`RecordingSink`]: keeps every event in memory for inspection

use crate::domain::{ComponentId, DependencyType, Metadata};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};

/// Number of hex characters kept from the event id hash.
const EVENT_ID_HASH_LENGTH: usize = 16;

static EVENT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Mint a unique event id of the form `{kind}-{hash}`.
///
/// The hash covers the kind, the subject ids, the timestamp and a
/// process-wide counter, so two events about the same subject in the same
/// instant still get distinct ids.
pub fn next_event_id(kind: &str, subjects: &[&str], at: DateTime<Utc>) -> String {
    let counter = EVENT_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    for subject in subjects {
        hasher.update([0u8]);
        hasher.update(subject.as_bytes());
    }
    hasher.update(at.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(counter.to_le_bytes());
    let digest = hasher.finalize();

    let hex: String = digest
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>()
        .chars()
        .take(EVENT_ID_HASH_LENGTH)
        .collect();

    format!("{kind}-{hex}")
}

/// Mint a correlation id for logging an internal error.
pub fn next_correlation_id() -> String {
    next_event_id("err", &[], Utc::now())
}

// ========== Component lifecycle ==========

/// Kind of lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleChange {
    /// Component registered
    Create,
    /// Status or metadata changed
    Update,
    /// Component removed
    Delete,
    /// Version changed
    VersionChange,
}

/// A component was created, updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEvent {
    /// Unique event id
    pub event_id: String,
    /// What happened
    pub change: LifecycleChange,
    /// Subject component
    pub component_id: ComponentId,
    /// Owning project
    pub project_id: String,
    /// Version before the change (`None` on create)
    pub previous_version: Option<String>,
    /// Version after the change (`None` on delete)
    pub new_version: Option<String>,
    /// When the change was committed
    pub timestamp: DateTime<Utc>,
}

impl ComponentEvent {
    /// Build an event stamped with a fresh id and the current time.
    pub fn new(
        change: LifecycleChange,
        component_id: ComponentId,
        project_id: impl Into<String>,
        previous_version: Option<String>,
        new_version: Option<String>,
    ) -> Self {
        let timestamp = Utc::now();
        Self {
            event_id: next_event_id("component", &[component_id.as_str()], timestamp),
            change,
            component_id,
            project_id: project_id.into(),
            previous_version,
            new_version,
            timestamp,
        }
    }
}

// ========== Dependency changes ==========

/// Kind of edge change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyChange {
    /// Edge committed
    Added,
    /// Edge removed
    Removed,
}

/// A dependency edge was added or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEvent {
    /// Unique event id
    pub event_id: String,
    /// What happened
    pub change: DependencyChange,
    /// Dependent
    pub source_component_id: ComponentId,
    /// Dependency
    pub target_component_id: ComponentId,
    /// Edge type
    pub dependency_type: DependencyType,
    /// When the change was committed
    pub timestamp: DateTime<Utc>,
}

impl DependencyEvent {
    /// Build an event stamped with a fresh id and the current time.
    pub fn new(
        change: DependencyChange,
        source: ComponentId,
        target: ComponentId,
        dependency_type: DependencyType,
    ) -> Self {
        let timestamp = Utc::now();
        Self {
            event_id: next_event_id("dependency", &[source.as_str(), target.as_str()], timestamp),
            change,
            source_component_id: source,
            target_component_id: target,
            dependency_type,
            timestamp,
        }
    }
}

// ========== Propagation ==========

/// How a change is propagated to dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropagationType {
    /// Version change; every dependent follows
    Cascade,
    /// Non-breaking change; dependents re-validate
    Selective,
    /// Breaking change; dependents must be regenerated
    Forced,
    /// Validation failed; dependents revert
    Rollback,
}

impl std::fmt::Display for PropagationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Cascade => "CASCADE",
            Self::Selective => "SELECTIVE",
            Self::Forced => "FORCED",
            Self::Rollback => "ROLLBACK",
        };
        f.write_str(s)
    }
}

/// Outcome of one propagation run, announced to the event boundary.
///
/// Ephemeral: it is returned to the caller and published, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationRecord {
    /// Unique event id
    pub event_id: String,
    /// Component whose change started the run
    pub trigger_component_id: ComponentId,
    /// Project of the trigger
    pub project_id: String,
    /// Every transitively affected component, trigger excluded, in BFS order
    pub affected_component_ids: Vec<ComponentId>,
    /// Classification of the run
    pub propagation_type: PropagationType,
    /// Free-form details of the triggering change
    pub update_details: Metadata,
    /// BFS layer of the farthest affected component
    pub propagation_depth: usize,
    /// `true` if the depth bound cut the walk short
    pub truncated: bool,
    /// When the run finished
    pub timestamp: DateTime<Utc>,
    /// Who started the run
    pub initiated_by: String,
}

// ========== Analysis ==========

/// Kind of analysis that produced an [`AnalysisEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisType {
    /// Impact of a proposed change
    ChangeImpact,
}

/// Summary of an impact analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEvent {
    /// Unique event id
    pub event_id: String,
    /// Analysed project
    pub project_id: String,
    /// Kind of analysis
    pub analysis_type: AnalysisType,
    /// What asked for the analysis
    pub trigger_source: String,
    /// Every affected component
    pub affected_components: Vec<ComponentId>,
    /// Headline numbers (`totalAffected`, `overallRisk`)
    pub analysis_results: serde_json::Map<String, serde_json::Value>,
    /// Recommendations produced by the analysis
    pub recommendations: Vec<String>,
    /// When the analysis finished
    pub timestamp: DateTime<Utc>,
}

// ========== Envelope ==========

/// Everything the core publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Component lifecycle change
    Component(ComponentEvent),
    /// Edge change
    Dependency(DependencyEvent),
    /// Propagation run
    Propagation(PropagationRecord),
    /// Impact analysis
    Analysis(AnalysisEvent),
}

impl OutboundEvent {
    /// Unique id of the wrapped event.
    pub fn event_id(&self) -> &str {
        match self {
            Self::Component(e) => &e.event_id,
            Self::Dependency(e) => &e.event_id,
            Self::Propagation(e) => &e.event_id,
            Self::Analysis(e) => &e.event_id,
        }
    }

    /// Logical topic the event belongs on.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Component(_) => "component-updates",
            Self::Dependency(_) => "dependency-changes",
            Self::Propagation(_) => "update-propagation",
            Self::Analysis(_) => "analysis-events",
        }
    }
}

impl From<ComponentEvent> for OutboundEvent {
    fn from(event: ComponentEvent) -> Self {
        Self::Component(event)
    }
}

impl From<DependencyEvent> for OutboundEvent {
    fn from(event: DependencyEvent) -> Self {
        Self::Dependency(event)
    }
}

impl From<PropagationRecord> for OutboundEvent {
    fn from(event: PropagationRecord) -> Self {
        Self::Propagation(event)
    }
}

impl From<AnalysisEvent> for OutboundEvent {
    fn from(event: AnalysisEvent) -> Self {
        Self::Analysis(event)
    }
}

// ========== Sinks ==========

/// The outbound event boundary.
///
/// `publish` must not block on downstream consumers.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Hand an event to the boundary.
    async fn publish(&self, event: OutboundEvent) -> Result<()>;
}

/// Publish without letting a failure escape.
///
/// Failures are logged at `warn` and dropped.
pub async fn publish_or_log(sink: &dyn EventSink, event: impl Into<OutboundEvent>) {
    let event = event.into();
    let event_id = event.event_id().to_string();
    let topic = event.topic();

    match sink.publish(event).await {
        Ok(()) => tracing::debug!(%event_id, topic, "Published event"),
        Err(e) => tracing::warn!(%event_id, topic, error = %e, "Failed to publish event"),
    }
}

/// Sink backed by a bounded tokio channel.
///
/// Uses `try_send`: a full or closed channel is reported as
/// [`Error::Publish`] instead of waiting.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<OutboundEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn publish(&self, event: OutboundEvent) -> Result<()> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::Publish("event channel is full".into()),
            mpsc::error::TrySendError::Closed(_) => {
                Error::Publish("event channel is closed".into())
            }
        })
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn publish(&self, _event: OutboundEvent) -> Result<()> {
        Ok(())
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<OutboundEvent>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event published so far, in order.
    pub async fn events(&self) -> Vec<OutboundEvent> {
        self.events.lock().await.clone()
    }

    /// Remove and return every event published so far.
    pub async fn take(&self) -> Vec<OutboundEvent> {
        std::mem::take(&mut *self.events.lock().await)
    }

    /// Only the propagation records, in order.
    pub async fn propagation_records(&self) -> Vec<PropagationRecord> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                OutboundEvent::Propagation(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: OutboundEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(id: &str) -> OutboundEvent {
        ComponentEvent::new(
            LifecycleChange::Create,
            ComponentId::new(id),
            "p",
            None,
            Some("1.0.0".to_string()),
        )
        .into()
    }

    #[test]
    fn test_event_ids_are_unique_for_same_subject() {
        let at = Utc::now();
        let a = next_event_id("component", &["web"], at);
        let b = next_event_id("component", &["web"], at);
        assert_ne!(a, b);
        assert!(a.starts_with("component-"));
        assert_eq!(a.len(), "component-".len() + EVENT_ID_HASH_LENGTH);
    }

    #[test]
    fn test_envelope_is_tagged() {
        let json = serde_json::to_value(created("web")).unwrap();
        assert_eq!(json["event"], "component");
        assert_eq!(json["change"], "CREATE");
        assert_eq!(json["component_id"], "web");
    }

    #[tokio::test]
    async fn test_channel_sink_reports_full_channel() {
        let (sink, mut receiver) = ChannelSink::new(1);
        sink.publish(created("a")).await.unwrap();

        let err = sink.publish(created("b")).await.unwrap_err();
        assert!(matches!(err, Error::Publish(_)));

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.topic(), "component-updates");
    }

    #[tokio::test]
    async fn test_channel_sink_reports_closed_channel() {
        let (sink, receiver) = ChannelSink::new(4);
        drop(receiver);
        assert!(sink.publish(created("a")).await.is_err());
    }

    #[tokio::test]
    async fn test_publish_or_log_swallows_failures() {
        let (sink, receiver) = ChannelSink::new(1);
        drop(receiver);
        // Must not panic or propagate
        publish_or_log(&sink, created("a")).await;
    }

    #[tokio::test]
    async fn test_recording_sink_take_drains() {
        let sink = RecordingSink::new();
        sink.publish(created("a")).await.unwrap();
        sink.publish(created("b")).await.unwrap();

        assert_eq!(sink.take().await.len(), 2);
        assert!(sink.events().await.is_empty());
    }
}
