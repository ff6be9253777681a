//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for ripple using clap's derive API.
//! Each command has its own argument struct with validation and helpful error messages.
//!
//! # Commands
//!
//! - `init`: Initialize a new ripple workspace
//! - `info`: Show workspace information
//! - `add` / `update` / `delete` / `show` / `list`: Component lifecycle
//! - `dep add|remove|list|path`: Dependency edges
//! - `impact`: Analyse a proposed change
//! - `propagate`: Announce a change to every dependent
//! - `replay`: Apply a file of inbound events
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//!
//! # Example
//!
//! ```bash
//! ripple add web --project shop --type frontend
//! ripple add api --project shop --type backend
//! ripple dep add web api --type api-call
//! ripple update api --version 2.0.0
//! ripple impact api --project shop -D "Change auth scheme"
//! ```

mod args;
mod execute;
mod types;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};

// Re-export argument structs
pub use args::{
    AddArgs, DeleteArgs, DepAction, DepArgs, ImpactArgs, InfoArgs, InitArgs, ListArgs,
    PropagateArgs, ReplayArgs, ShowArgs, UpdateArgs,
};

// Re-export types
pub use types::{
    ChangeTypeArg, ComponentStatusArg, ComponentTypeArg, DependencyTypeArg, DepthArg, StrengthArg,
};

// Re-export validators for external use
pub use validators::{
    parse_metadata_entry, validate_component_id, validate_non_empty, validate_version,
};

/// Ripple - component dependency graph with change propagation
///
/// Track generated components and the dependencies between them, analyse the
/// impact of a change, and propagate changes to every dependent. The graph is
/// stored in `.ripple/graph.jsonl`.
#[derive(Parser, Debug)]
#[command(name = "ripple")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a new ripple workspace
    ///
    /// Creates the `.ripple/` directory with configuration and an empty graph.
    Init(InitArgs),

    /// Show workspace information
    ///
    /// Displays the snapshot path and component and edge counts.
    Info(InfoArgs),

    /// Register a new component
    Add(AddArgs),

    /// Update an existing component
    ///
    /// A version change or `--breaking` propagates to every dependent.
    Update(UpdateArgs),

    /// Delete a component nothing depends on
    Delete(DeleteArgs),

    /// Show a component with its direct edges
    Show(ShowArgs),

    /// List components
    List(ListArgs),

    /// Manage dependency edges
    Dep(DepArgs),

    /// Analyse the impact of a proposed change
    ///
    /// Read-only: walks dependencies from each target and grades every
    /// reached component.
    Impact(ImpactArgs),

    /// Propagate a change to every transitive dependent
    Propagate(PropagateArgs),

    /// Apply inbound events from a JSON Lines file
    ///
    /// Each line is a change event, generation request or validation result
    /// tagged with `"stream"`.
    Replay(ReplayArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        use crate::engine::Engine;
        use crate::events::RecordingSink;
        use crate::output::OutputMode;
        use std::sync::Arc;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        let Some(command) = &self.command else {
            println!("Ripple - component dependency graph");
            println!();
            println!("Run 'ripple --help' for usage information.");
            return Ok(());
        };

        let current_dir = std::env::current_dir()?;
        match command {
            Commands::Init(args) => return execute::execute_init(args, output_mode).await,
            Commands::Replay(args) => {
                let sink = Arc::new(RecordingSink::new());
                let engine = Engine::open_with_sink(&current_dir, sink.clone()).await?;
                return execute::execute_replay(&engine, &sink, args, output_mode).await;
            }
            _ => {}
        }

        let engine = Engine::open(&current_dir).await?;
        match command {
            Commands::Init(_) | Commands::Replay(_) => Ok(()),
            Commands::Info(args) => execute::execute_info(&engine, args, output_mode).await,
            Commands::Add(args) => execute::execute_add(&engine, args, output_mode).await,
            Commands::Update(args) => execute::execute_update(&engine, args, output_mode).await,
            Commands::Delete(args) => execute::execute_delete(&engine, args, output_mode).await,
            Commands::Show(args) => execute::execute_show(&engine, args, output_mode).await,
            Commands::List(args) => execute::execute_list(&engine, args, output_mode).await,
            Commands::Dep(args) => execute::execute_dep(&engine, args, output_mode).await,
            Commands::Impact(args) => execute::execute_impact(&engine, args, output_mode).await,
            Commands::Propagate(args) => {
                execute::execute_propagate(&engine, args, output_mode).await
            }
        }
    }
}
