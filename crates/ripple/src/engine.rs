//! Engine: the wired-up core behind the query interface.
//!
//! [`Engine`] owns one store and one event sink and builds every component
//! service on top of them. The CLI and any embedding service talk to the
//! graph through this type.
//!
//! # Example
//!
//! ```no_run
//! use ripple::engine::Engine;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Engine::open(Path::new(".")).await?;
//!     let stats = engine.stats().await?;
//!     println!("{} components", stats.components);
//!     Ok(())
//! }
//! ```

use crate::config::{CONFIG_FILE_NAME, EngineConfig, RIPPLE_DIR_NAME, find_ripple_root};
use crate::dependency::DependencyManager;
use crate::domain::{Component, ComponentId, ComponentType, Dependency, DependencyPath};
use crate::error::{Error, Result};
use crate::events::{ChannelSink, EventSink, NullSink, OutboundEvent};
use crate::impact::{ImpactAnalysis, ImpactAnalyzer, ImpactRequest};
use crate::inbound::EventProcessor;
use crate::propagation::{ChangeDetails, PropagationEngine, PropagationOutcome};
use crate::registry::ComponentRegistry;
use crate::storage::{Deadline, GraphStore, StoreBackend, StoreStats, create_store};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A component together with its direct edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentDetails {
    /// The component
    #[serde(flatten)]
    pub component: Component,
    /// Outgoing edges
    pub dependencies: Vec<Dependency>,
    /// Incoming edges
    pub dependents: Vec<Dependency>,
}

/// Store, sink and services wired together.
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn GraphStore>,
    ripple_dir: Option<PathBuf>,
    registry: ComponentRegistry,
    dependencies: DependencyManager,
    propagation: PropagationEngine,
    impact: ImpactAnalyzer,
    processor: EventProcessor,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("ripple_dir", &self.ripple_dir)
            .field("store", &"<dyn GraphStore>")
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Wire services over an existing store and sink.
    pub fn new(store: Arc<dyn GraphStore>, events: Arc<dyn EventSink>, config: EngineConfig) -> Self {
        let dependencies = DependencyManager::new(
            Arc::clone(&store),
            Arc::clone(&events),
            config.mutation_timeout(),
        );
        let propagation = PropagationEngine::new(Arc::clone(&store), Arc::clone(&events), &config);
        let registry = ComponentRegistry::new(
            Arc::clone(&store),
            Arc::clone(&events),
            dependencies.clone(),
            propagation.clone(),
        );
        let impact = ImpactAnalyzer::new(
            Arc::clone(&store),
            events,
            config.analysis_timeout(),
            config.publish_analysis_events,
        );
        let processor = EventProcessor::new(
            registry.clone(),
            dependencies.clone(),
            propagation.clone(),
            config.processed_event_cache,
        );

        Self {
            config,
            store,
            ripple_dir: None,
            registry,
            dependencies,
            propagation,
            impact,
            processor,
        }
    }

    /// Wire services over `store` with outbound events delivered on a
    /// bounded channel of `config.event_channel_capacity`.
    ///
    /// Events published while the channel is full are dropped and logged.
    pub fn with_channel(
        store: Arc<dyn GraphStore>,
        config: EngineConfig,
    ) -> (Self, mpsc::Receiver<OutboundEvent>) {
        let (sink, receiver) = ChannelSink::new(config.event_channel_capacity);
        (Self::new(store, Arc::new(sink), config), receiver)
    }

    /// Open the workspace containing `working_dir`.
    ///
    /// Searches up the directory tree for `.ripple/`, loads its config and
    /// snapshot. Outbound events go to `events`.
    ///
    /// # Errors
    ///
    /// - `Config` if no workspace is found or the config is invalid
    /// - `StoreUnavailable` if the snapshot cannot be read
    pub async fn open_with_sink(working_dir: &Path, events: Arc<dyn EventSink>) -> Result<Self> {
        let root = find_ripple_root(working_dir).ok_or_else(|| {
            Error::Config("not a ripple workspace (run 'ripple init' first)".to_string())
        })?;
        let ripple_dir = root.join(RIPPLE_DIR_NAME);

        let config = EngineConfig::load(&ripple_dir.join(CONFIG_FILE_NAME)).await?;
        let snapshot = ripple_dir.join(&config.snapshot_file);
        let store = create_store(StoreBackend::Snapshot(snapshot)).await?;

        let mut engine = Self::new(store, events, config);
        engine.ripple_dir = Some(ripple_dir);
        Ok(engine)
    }

    /// [`Engine::open_with_sink`] discarding outbound events.
    pub async fn open(working_dir: &Path) -> Result<Self> {
        Self::open_with_sink(working_dir, Arc::new(NullSink)).await
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// `.ripple` directory, when opened from disk.
    pub fn ripple_dir(&self) -> Option<&Path> {
        self.ripple_dir.as_deref()
    }

    /// Shared store.
    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Component lifecycle service.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Edge mutation and query service.
    pub fn dependencies(&self) -> &DependencyManager {
        &self.dependencies
    }

    /// Inbound stream processor.
    pub fn processor(&self) -> &EventProcessor {
        &self.processor
    }

    // ========== Queries ==========

    /// Get a component, or `ComponentNotFound`.
    pub async fn component(&self, id: &ComponentId) -> Result<Component> {
        self.registry
            .get_component(id)
            .await?
            .ok_or_else(|| Error::ComponentNotFound(id.clone()))
    }

    /// Get a component with its direct edges.
    pub async fn component_details(&self, id: &ComponentId) -> Result<ComponentDetails> {
        let component = self.component(id).await?;
        let dependencies = self.dependencies.direct_dependencies(id).await?;
        let dependents = self.dependencies.direct_dependents(id).await?;
        Ok(ComponentDetails {
            component,
            dependencies,
            dependents,
        })
    }

    /// Components of a project, ordered by id.
    pub async fn components_by_project(&self, project_id: &str) -> Result<Vec<Component>> {
        self.registry.list_by_project(project_id).await
    }

    /// Components of a type, ordered by id.
    pub async fn components_by_type(&self, component_type: ComponentType) -> Result<Vec<Component>> {
        self.registry.list_by_type(component_type).await
    }

    /// Transitive dependents, bounded by the analysis timeout.
    pub async fn transitive_dependents(&self, id: &ComponentId) -> Result<Vec<Component>> {
        self.bounded(self.dependencies.all_dependents(id, self.query_deadline()))
            .await
    }

    /// Transitive dependencies, bounded by the analysis timeout.
    pub async fn transitive_dependencies(&self, id: &ComponentId) -> Result<Vec<Component>> {
        self.bounded(self.dependencies.all_dependencies(id, self.query_deadline()))
            .await
    }

    /// Path `source -> ... -> target`, if one exists.
    pub async fn dependency_path(
        &self,
        source: &ComponentId,
        target: &ComponentId,
    ) -> Result<Option<DependencyPath>> {
        self.bounded(
            self.dependencies
                .find_dependency_path(source, target, self.query_deadline()),
        )
        .await
    }

    /// Run an impact analysis.
    pub async fn analyze(&self, request: &ImpactRequest) -> Result<ImpactAnalysis> {
        self.impact.analyze(request).await
    }

    /// Propagate a change of `id` explicitly.
    pub async fn propagate(
        &self,
        id: &ComponentId,
        change: ChangeDetails,
    ) -> Result<PropagationOutcome> {
        self.propagation.propagate(id, change).await
    }

    /// Component and edge counts.
    pub async fn stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }

    /// Persist the store (no-op for the in-memory backend).
    pub async fn save(&self) -> Result<()> {
        self.store.save().await
    }

    fn query_deadline(&self) -> Deadline {
        Deadline::after(self.config.analysis_timeout())
    }

    async fn bounded<T>(&self, query: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.config.analysis_timeout();
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let timed_out = || Error::AnalysisTimeout { timeout_ms };

        tokio::time::timeout(timeout, query)
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| match e {
                Error::DeadlineExceeded => timed_out(),
                other => other,
            })
    }
}
