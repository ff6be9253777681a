//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use ripple::config::EngineConfig;
use ripple::domain::{Component, ComponentId, ComponentType, DependencyType, NewComponent};
use ripple::engine::Engine;
use ripple::events::RecordingSink;
use ripple::storage::in_memory::new_in_memory_store;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

/// Project every helper registers components under.
pub const PROJECT: &str = "shop";

/// An in-memory engine whose outbound events are recorded.
pub fn recording_engine() -> (Engine, Arc<RecordingSink>) {
    recording_engine_with(EngineConfig::default())
}

/// [`recording_engine`] with a custom configuration.
pub fn recording_engine_with(config: EngineConfig) -> (Engine, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let engine = Engine::new(new_in_memory_store(), sink.clone(), config);
    (engine, sink)
}

/// Shorthand for a component id.
pub fn id(s: &str) -> ComponentId {
    ComponentId::new(s)
}

/// Register a `SERVICE` component at version 1.0.0 in [`PROJECT`].
pub async fn create(engine: &Engine, component_id: &str) -> Component {
    create_in(engine, component_id, PROJECT).await
}

/// Register a `SERVICE` component at version 1.0.0 in `project`.
pub async fn create_in(engine: &Engine, component_id: &str, project: &str) -> Component {
    engine
        .registry()
        .create_component(NewComponent::new(
            component_id,
            component_id.to_uppercase(),
            ComponentType::Service,
            "1.0.0",
            project,
        ))
        .await
        .unwrap()
}

/// Add a `RUNTIME` edge `source -> target`.
pub async fn depend(engine: &Engine, source: &str, target: &str) {
    engine
        .dependencies()
        .add_dependency(&id(source), &id(target), DependencyType::Runtime)
        .await
        .unwrap();
}

/// Register `ids` and chain them: `ids[0] -> ids[1] -> ...`.
pub async fn chain(engine: &Engine, ids: &[&str]) {
    for component_id in ids {
        create(engine, component_id).await;
    }
    for pair in ids.windows(2) {
        depend(engine, pair[0], pair[1]).await;
    }
}

/// Run the ripple binary in `dir`.
pub fn run_ripple_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ripple"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute ripple binary")
}
