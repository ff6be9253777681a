//! Engine configuration.
//!
//! Configuration lives in `.ripple/config.yaml`. Every field has a default,
//! so a partial (or empty) file is valid:
//!
//! ```yaml
//! analysis_timeout_ms: 5000
//! propagation_timeout_ms: 5000
//! mutation_timeout_ms: 5000
//! max_propagation_depth: 64
//! publish_analysis_events: true
//! event_channel_capacity: 1024
//! processed_event_cache: 4096
//! default_initiator: system
//! snapshot_file: graph.jsonl
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Name of the ripple directory
pub const RIPPLE_DIR_NAME: &str = ".ripple";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the graph snapshot file
pub const SNAPSHOT_FILE_NAME: &str = "graph.jsonl";

/// Maximum directory depth to traverse when searching for the ripple root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Default deadline for impact analysis and propagation, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default bound on propagation depth
pub const DEFAULT_MAX_PROPAGATION_DEPTH: usize = 64;

/// Default initiator recorded on propagation records
pub const DEFAULT_INITIATOR: &str = "system";

/// Tunables for the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Deadline for one impact analysis
    pub analysis_timeout_ms: u64,

    /// Deadline for one propagation run
    pub propagation_timeout_ms: u64,

    /// Deadline for the cycle check run while an edge mutation holds the
    /// store's write lock
    pub mutation_timeout_ms: u64,

    /// BFS layers explored before propagation stops and reports `truncated`
    pub max_propagation_depth: usize,

    /// Publish an analysis event after every impact analysis
    pub publish_analysis_events: bool,

    /// Capacity of the outbound event channel
    pub event_channel_capacity: usize,

    /// Number of inbound event ids remembered for duplicate detection
    pub processed_event_cache: usize,

    /// Initiator used when a change doesn't name one
    pub default_initiator: String,

    /// Snapshot file name, relative to the ripple directory
    pub snapshot_file: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analysis_timeout_ms: DEFAULT_TIMEOUT_MS,
            propagation_timeout_ms: DEFAULT_TIMEOUT_MS,
            mutation_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_propagation_depth: DEFAULT_MAX_PROPAGATION_DEPTH,
            publish_analysis_events: true,
            event_channel_capacity: 1024,
            processed_event_cache: 4096,
            default_initiator: DEFAULT_INITIATOR.to_string(),
            snapshot_file: SNAPSHOT_FILE_NAME.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Check every field is usable.
    pub fn validate(&self) -> Result<()> {
        if self.analysis_timeout_ms == 0 {
            return Err(Error::Config("analysis_timeout_ms must be positive".into()));
        }
        if self.propagation_timeout_ms == 0 {
            return Err(Error::Config(
                "propagation_timeout_ms must be positive".into(),
            ));
        }
        if self.mutation_timeout_ms == 0 {
            return Err(Error::Config("mutation_timeout_ms must be positive".into()));
        }
        if self.max_propagation_depth == 0 {
            return Err(Error::Config(
                "max_propagation_depth must be at least 1".into(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::Config(
                "event_channel_capacity must be at least 1".into(),
            ));
        }
        if self.default_initiator.trim().is_empty() {
            return Err(Error::Config("default_initiator cannot be empty".into()));
        }
        if self.snapshot_file.trim().is_empty() {
            return Err(Error::Config("snapshot_file cannot be empty".into()));
        }
        Ok(())
    }

    /// Deadline for one impact analysis.
    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis_timeout_ms)
    }

    /// Deadline for one propagation run.
    pub fn propagation_timeout(&self) -> Duration {
        Duration::from_millis(self.propagation_timeout_ms)
    }

    /// Deadline for the cycle check of one edge mutation.
    pub fn mutation_timeout(&self) -> Duration {
        Duration::from_millis(self.mutation_timeout_ms)
    }
}

/// Find the ripple root directory by searching up the directory tree.
///
/// Returns the directory containing `.ripple/`, or `None` if none is found
/// within [`MAX_TRAVERSAL_DEPTH`] levels.
pub fn find_ripple_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(RIPPLE_DIR_NAME).exists() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}
