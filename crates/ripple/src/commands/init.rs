//! Implementation of the `init` command.
//!
//! Creates the `.ripple/` directory with a default configuration file and an
//! empty graph snapshot.

use crate::config::{CONFIG_FILE_NAME, EngineConfig, RIPPLE_DIR_NAME};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Name of the gitignore file within .ripple
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Result of the init command
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created ripple directory
    pub ripple_dir: PathBuf,
    /// Path to the created config file
    pub config_file: PathBuf,
    /// Path to the created snapshot file
    pub snapshot_file: PathBuf,
}

/// Initialize a new ripple workspace in the given directory.
///
/// # Errors
///
/// Returns an error if:
/// - The `.ripple/` directory already exists
/// - File system operations fail
pub async fn init(base_dir: &Path) -> Result<InitResult> {
    let ripple_dir = base_dir.join(RIPPLE_DIR_NAME);

    if ripple_dir.exists() {
        return Err(Error::Config(format!(
            "Ripple is already initialized in this directory. Found existing '{RIPPLE_DIR_NAME}'"
        )));
    }

    fs::create_dir_all(&ripple_dir).await?;

    let config = EngineConfig::default();
    let config_file = ripple_dir.join(CONFIG_FILE_NAME);
    config.save(&config_file).await?;

    let snapshot_file = ripple_dir.join(&config.snapshot_file);
    fs::write(&snapshot_file, "").await?;

    // Temp files from interrupted snapshot writes
    fs::write(ripple_dir.join(GITIGNORE_FILE_NAME), "*.tmp\n").await?;

    tracing::info!(path = %ripple_dir.display(), "Initialized ripple workspace");

    Ok(InitResult {
        ripple_dir,
        config_file,
        snapshot_file,
    })
}

/// Check if a directory has been initialized with ripple.
pub fn is_initialized(base_dir: &Path) -> bool {
    base_dir.join(RIPPLE_DIR_NAME).exists()
}
