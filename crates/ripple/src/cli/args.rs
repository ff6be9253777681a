//! CLI argument structs for all commands.
//!
//! Each command has its own argument struct with clap derive attributes
//! for parsing and validation.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use super::types::{
    ChangeTypeArg, ComponentStatusArg, ComponentTypeArg, DependencyTypeArg, DepthArg, StrengthArg,
};
use super::validators::{
    parse_metadata_entry, validate_component_id, validate_non_empty, validate_version,
};
use crate::domain::ComponentId;

/// Arguments for the `init` command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {}

/// Arguments for the `add` command
#[derive(Parser, Debug, Clone)]
pub struct AddArgs {
    /// Component ID (unique across all projects)
    #[arg(value_parser = validate_component_id)]
    pub id: ComponentId,

    /// Owning project
    #[arg(short, long, value_parser = validate_non_empty)]
    pub project: String,

    /// Component type
    #[arg(short = 't', long = "type", value_enum)]
    pub component_type: ComponentTypeArg,

    /// Human readable name (defaults to the ID)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Initial version
    #[arg(short, long, value_parser = validate_version, default_value = "1.0.0")]
    pub version: String,

    /// Metadata entries (key=value, repeatable)
    #[arg(short, long = "meta", value_parser = parse_metadata_entry)]
    pub metadata: Vec<(String, Value)>,
}

/// Arguments for the `update` command
#[derive(Parser, Debug, Clone)]
pub struct UpdateArgs {
    /// Component ID to update
    #[arg(value_parser = validate_component_id)]
    pub id: ComponentId,

    /// New version (triggers propagation when it changes)
    #[arg(short, long, value_parser = validate_version)]
    pub version: Option<String>,

    /// New status
    #[arg(short, long, value_enum)]
    pub status: Option<ComponentStatusArg>,

    /// Metadata entries to merge (key=value, repeatable; `key=null` removes)
    #[arg(short, long = "meta", value_parser = parse_metadata_entry)]
    pub metadata: Vec<(String, Value)>,

    /// Flag the change as breaking
    #[arg(long)]
    pub breaking: bool,

    /// Who is making the change
    #[arg(long)]
    pub by: Option<String>,
}

/// Arguments for the `delete` command
#[derive(Parser, Debug, Clone)]
pub struct DeleteArgs {
    /// Component ID to delete
    #[arg(value_parser = validate_component_id)]
    pub id: ComponentId,
}

/// Arguments for the `show` command
#[derive(Parser, Debug, Clone)]
pub struct ShowArgs {
    /// Component ID to display
    #[arg(value_parser = validate_component_id)]
    pub id: ComponentId,
}

/// Arguments for the `list` command
#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    /// Filter by project
    #[arg(short, long)]
    pub project: Option<String>,

    /// Filter by component type
    #[arg(short = 't', long = "type", value_enum)]
    pub component_type: Option<ComponentTypeArg>,

    /// Maximum number of components to display
    #[arg(short = 'n', long, default_value = "100")]
    pub limit: usize,
}

/// Arguments for the `dep` command
#[derive(Parser, Debug, Clone)]
pub struct DepArgs {
    /// Dependency action
    #[command(subcommand)]
    pub action: DepAction,
}

/// Dependency subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum DepAction {
    /// Add an edge: SOURCE requires TARGET
    Add {
        /// Dependent component
        #[arg(value_parser = validate_component_id)]
        source: ComponentId,

        /// Component it depends on
        #[arg(value_parser = validate_component_id)]
        target: ComponentId,

        /// Edge type
        #[arg(short = 't', long = "type", value_enum, default_value = "compile")]
        dep_type: DependencyTypeArg,

        /// Edge strength
        #[arg(short, long, value_enum, default_value = "strong")]
        strength: StrengthArg,
    },

    /// Remove an edge
    Remove {
        /// Dependent component
        #[arg(value_parser = validate_component_id)]
        source: ComponentId,

        /// Component it depends on
        #[arg(value_parser = validate_component_id)]
        target: ComponentId,

        /// Edge type
        #[arg(short = 't', long = "type", value_enum, default_value = "compile")]
        dep_type: DependencyTypeArg,
    },

    /// List dependencies (or dependents) of a component
    List {
        /// Component to inspect
        #[arg(value_parser = validate_component_id)]
        id: ComponentId,

        /// List what depends on the component instead
        #[arg(long)]
        dependents: bool,

        /// Include indirect edges
        #[arg(long)]
        transitive: bool,
    },

    /// Show a dependency path between two components
    Path {
        /// Start of the path
        #[arg(value_parser = validate_component_id)]
        source: ComponentId,

        /// End of the path
        #[arg(value_parser = validate_component_id)]
        target: ComponentId,
    },
}

/// Arguments for the `impact` command
#[derive(Parser, Debug, Clone)]
pub struct ImpactArgs {
    /// Components the change touches directly
    #[arg(required = true, value_parser = validate_component_id)]
    pub targets: Vec<ComponentId>,

    /// Project the targets belong to
    #[arg(short, long, value_parser = validate_non_empty)]
    pub project: String,

    /// What the change is
    #[arg(short = 'D', long, value_parser = validate_non_empty)]
    pub description: String,

    /// Category of the change
    #[arg(short = 'c', long = "change-type", value_enum, default_value = "feature-modify")]
    pub change_type: ChangeTypeArg,

    /// How far to walk from each target
    #[arg(short, long, value_enum, default_value = "normal")]
    pub depth: DepthArg,
}

/// Arguments for the `propagate` command
#[derive(Parser, Debug, Clone)]
pub struct PropagateArgs {
    /// Component whose change is propagated
    #[arg(value_parser = validate_component_id)]
    pub id: ComponentId,

    /// Force propagation across every edge strength
    #[arg(long, conflicts_with = "rollback")]
    pub breaking: bool,

    /// Propagate a rollback
    #[arg(long)]
    pub rollback: bool,

    /// Follow only edges at least this strong
    #[arg(long, value_enum)]
    pub min_strength: Option<StrengthArg>,

    /// Who is making the change
    #[arg(long)]
    pub by: Option<String>,
}

/// Arguments for the `replay` command
#[derive(Parser, Debug, Clone)]
pub struct ReplayArgs {
    /// JSON Lines file of inbound events
    pub file: PathBuf,

    /// Keep going after an event fails
    #[arg(long)]
    pub keep_going: bool,
}
