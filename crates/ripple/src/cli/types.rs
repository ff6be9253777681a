//! CLI value enums and domain type conversions.
//!
//! This module contains the value enums used for CLI argument parsing
//! and their conversions to domain types.

use clap::ValueEnum;

use crate::domain::{ComponentStatus, ComponentType, DependencyStrength, DependencyType};
use crate::impact::{AnalysisDepth, ChangeType};

// ============================================================================
// Value Enums
// ============================================================================

/// Component type for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentTypeArg {
    /// User-facing frontend module
    Frontend,
    /// Backend service code
    Backend,
    /// Database schema or migration
    Database,
    /// API definition
    Api,
    /// Deployable service
    Service,
    /// Shared library
    Library,
    /// Configuration bundle
    Configuration,
    /// Infrastructure definition
    Infrastructure,
}

/// Component status for CLI arguments
///
/// `DELETED` is not offered; use `ripple delete`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentStatusArg {
    /// In use
    Active,
    /// Still present but scheduled for removal
    Deprecated,
}

/// Dependency type for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyTypeArg {
    /// Needed to build
    Compile,
    /// Needed to run
    Runtime,
    /// Needed by tests only
    Test,
    /// Supplied by the environment
    Provided,
    /// Source-level import
    Import,
    /// Calls the dependency's API
    #[value(name = "api-call", alias = "api_call")]
    ApiCall,
    /// Reads or writes the dependency's data
    Database,
    /// Reads the dependency's configuration
    Configuration,
}

/// Dependency strength for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthArg {
    /// Changes are unlikely to matter
    Optional,
    /// Changes may matter
    Weak,
    /// Changes always matter
    Strong,
}

/// Analysis depth for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthArg {
    /// 1 hop
    Shallow,
    /// 2 hops
    Normal,
    /// Unbounded
    Deep,
}

/// Change category for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeTypeArg {
    /// New feature
    #[value(name = "feature-add")]
    FeatureAdd,
    /// Change to an existing feature
    #[value(name = "feature-modify")]
    FeatureModify,
    /// Feature removal
    #[value(name = "feature-remove")]
    FeatureRemove,
    /// Restructuring
    Refactor,
    /// Defect fix
    #[value(name = "bug-fix")]
    BugFix,
    /// Performance work
    Performance,
    /// Security change
    Security,
    /// Third-party bump
    #[value(name = "dependency-update")]
    DependencyUpdate,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<ComponentTypeArg> for ComponentType {
    fn from(arg: ComponentTypeArg) -> Self {
        match arg {
            ComponentTypeArg::Frontend => ComponentType::Frontend,
            ComponentTypeArg::Backend => ComponentType::Backend,
            ComponentTypeArg::Database => ComponentType::Database,
            ComponentTypeArg::Api => ComponentType::Api,
            ComponentTypeArg::Service => ComponentType::Service,
            ComponentTypeArg::Library => ComponentType::Library,
            ComponentTypeArg::Configuration => ComponentType::Configuration,
            ComponentTypeArg::Infrastructure => ComponentType::Infrastructure,
        }
    }
}

impl From<ComponentStatusArg> for ComponentStatus {
    fn from(arg: ComponentStatusArg) -> Self {
        match arg {
            ComponentStatusArg::Active => ComponentStatus::Active,
            ComponentStatusArg::Deprecated => ComponentStatus::Deprecated,
        }
    }
}

impl From<DependencyTypeArg> for DependencyType {
    fn from(arg: DependencyTypeArg) -> Self {
        match arg {
            DependencyTypeArg::Compile => DependencyType::Compile,
            DependencyTypeArg::Runtime => DependencyType::Runtime,
            DependencyTypeArg::Test => DependencyType::Test,
            DependencyTypeArg::Provided => DependencyType::Provided,
            DependencyTypeArg::Import => DependencyType::Import,
            DependencyTypeArg::ApiCall => DependencyType::ApiCall,
            DependencyTypeArg::Database => DependencyType::Database,
            DependencyTypeArg::Configuration => DependencyType::Configuration,
        }
    }
}

impl From<StrengthArg> for DependencyStrength {
    fn from(arg: StrengthArg) -> Self {
        match arg {
            StrengthArg::Optional => DependencyStrength::Optional,
            StrengthArg::Weak => DependencyStrength::Weak,
            StrengthArg::Strong => DependencyStrength::Strong,
        }
    }
}

impl From<DepthArg> for AnalysisDepth {
    fn from(arg: DepthArg) -> Self {
        match arg {
            DepthArg::Shallow => AnalysisDepth::Shallow,
            DepthArg::Normal => AnalysisDepth::Normal,
            DepthArg::Deep => AnalysisDepth::Deep,
        }
    }
}

impl From<ChangeTypeArg> for ChangeType {
    fn from(arg: ChangeTypeArg) -> Self {
        match arg {
            ChangeTypeArg::FeatureAdd => ChangeType::FeatureAdd,
            ChangeTypeArg::FeatureModify => ChangeType::FeatureModify,
            ChangeTypeArg::FeatureRemove => ChangeType::FeatureRemove,
            ChangeTypeArg::Refactor => ChangeType::Refactor,
            ChangeTypeArg::BugFix => ChangeType::BugFix,
            ChangeTypeArg::Performance => ChangeType::Performance,
            ChangeTypeArg::Security => ChangeType::Security,
            ChangeTypeArg::DependencyUpdate => ChangeType::DependencyUpdate,
        }
    }
}
