//! Error types for ripple operations.
//!
//! Every variant maps to a stable [`ErrorCode`] and status number, and can be
//! rendered as a structured [`ErrorPayload`] carrying the offending ids, so
//! callers can react programmatically instead of parsing messages.

use crate::domain::{ComponentId, DependencyType};
use serde::Serialize;
use std::io;
use thiserror::Error;

/// The error type for ripple operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Component does not exist.
    #[error("Component not found: {0}")]
    ComponentNotFound(ComponentId),

    /// A component with this id is already registered.
    #[error("Component already exists: {0}")]
    DuplicateComponent(ComponentId),

    /// Deletion blocked by components that still depend on this one.
    #[error("Cannot delete {component_id}: {} component(s) depend on it", .dependents.len())]
    DependentsExist {
        /// The component that was to be deleted
        component_id: ComponentId,
        /// Direct dependents blocking the deletion
        dependents: Vec<ComponentId>,
    },

    /// Adding the edge would close a cycle.
    #[error("Circular dependency detected between {from} and {to}")]
    CircularDependency {
        /// Source of the rejected edge
        from: ComponentId,
        /// Target of the rejected edge
        to: ComponentId,
    },

    /// A component cannot depend on itself.
    #[error("Component {0} cannot depend on itself")]
    SelfDependency(ComponentId),

    /// The requested change conflicts with existing edges.
    #[error("Dependency conflict: {message}")]
    DependencyConflict {
        /// What conflicted
        message: String,
        /// Components involved in the conflict
        components: Vec<ComponentId>,
    },

    /// No edge matches the requested `(source, target, type)`.
    #[error("Dependency not found: {from} --[{dep_type}]--> {to}")]
    DependencyNotFound {
        /// Edge source
        from: ComponentId,
        /// Edge target
        to: ComponentId,
        /// Edge type
        dep_type: DependencyType,
    },

    /// Input failed validation.
    #[error("Invalid {field}: {reason}")]
    InvalidComponent {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Impact analysis did not finish within its deadline.
    #[error("Impact analysis timed out after {timeout_ms}ms")]
    AnalysisTimeout {
        /// Configured deadline
        timeout_ms: u64,
    },

    /// Propagation did not finish within its deadline.
    #[error("Propagation from {component_id} timed out after {timeout_ms}ms")]
    PropagationTimeout {
        /// Trigger component
        component_id: ComponentId,
        /// Configured deadline
        timeout_ms: u64,
    },

    /// The cycle check for a new edge ran past its deadline; nothing was
    /// committed.
    #[error("Cycle check for {from} -> {to} timed out")]
    CycleCheckTimeout {
        /// Source of the edge being added
        from: ComponentId,
        /// Target of the edge being added
        to: ComponentId,
    },

    /// A graph traversal ran past its deadline.
    ///
    /// Raised by the store; the engine reports it to callers as
    /// [`Error::AnalysisTimeout`] or [`Error::PropagationTimeout`].
    #[error("Graph traversal deadline exceeded")]
    DeadlineExceeded,

    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// An outbound event could not be handed to the event boundary.
    #[error("Event publish failed: {0}")]
    Publish(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected failure, tagged with a correlation id for log lookup.
    #[error("Internal error [{correlation_id}]: {message}")]
    Internal {
        /// Id logged alongside the failure
        correlation_id: String,
        /// Description of the failure
        message: String,
    },
}

/// Stable, machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// [`Error::ComponentNotFound`]
    ComponentNotFound,
    /// [`Error::DuplicateComponent`]
    DuplicateComponent,
    /// [`Error::DependentsExist`]
    DependentsExist,
    /// [`Error::CircularDependency`]
    CircularDependency,
    /// [`Error::SelfDependency`]
    SelfDependency,
    /// [`Error::DependencyConflict`]
    DependencyConflict,
    /// [`Error::DependencyNotFound`]
    DependencyNotFound,
    /// [`Error::InvalidComponent`]
    ValidationFailed,
    /// [`Error::AnalysisTimeout`]
    AnalysisTimeout,
    /// [`Error::PropagationTimeout`]
    PropagationTimeout,
    /// [`Error::CycleCheckTimeout`]
    CycleCheckTimeout,
    /// [`Error::DeadlineExceeded`]
    DeadlineExceeded,
    /// [`Error::StoreUnavailable`]
    StoreUnavailable,
    /// [`Error::Publish`]
    PublishFailed,
    /// [`Error::Config`]
    ConfigError,
    /// [`Error::Io`], [`Error::Json`] and [`Error::Internal`]
    InternalError,
}

impl ErrorCode {
    /// The code as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ComponentNotFound => "COMPONENT_NOT_FOUND",
            Self::DuplicateComponent => "DUPLICATE_COMPONENT",
            Self::DependentsExist => "DEPENDENTS_EXIST",
            Self::CircularDependency => "CIRCULAR_DEPENDENCY",
            Self::SelfDependency => "SELF_DEPENDENCY",
            Self::DependencyConflict => "DEPENDENCY_CONFLICT",
            Self::DependencyNotFound => "DEPENDENCY_NOT_FOUND",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::AnalysisTimeout => "ANALYSIS_TIMEOUT",
            Self::PropagationTimeout => "PROPAGATION_TIMEOUT",
            Self::CycleCheckTimeout => "CYCLE_CHECK_TIMEOUT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::PublishFailed => "PUBLISH_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured representation of an error for API boundaries.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    /// Stable error code
    pub code: ErrorCode,
    /// HTTP-like status number
    pub status: u16,
    /// Human readable message
    pub message: String,
    /// Offending ids and other machine-readable context
    pub details: serde_json::Value,
}

impl Error {
    /// Wrap an unexpected failure, minting a fresh correlation id.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            correlation_id: crate::events::next_correlation_id(),
            message: message.into(),
        }
    }

    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ComponentNotFound(_) => ErrorCode::ComponentNotFound,
            Self::DuplicateComponent(_) => ErrorCode::DuplicateComponent,
            Self::DependentsExist { .. } => ErrorCode::DependentsExist,
            Self::CircularDependency { .. } => ErrorCode::CircularDependency,
            Self::SelfDependency(_) => ErrorCode::SelfDependency,
            Self::DependencyConflict { .. } => ErrorCode::DependencyConflict,
            Self::DependencyNotFound { .. } => ErrorCode::DependencyNotFound,
            Self::InvalidComponent { .. } => ErrorCode::ValidationFailed,
            Self::AnalysisTimeout { .. } => ErrorCode::AnalysisTimeout,
            Self::PropagationTimeout { .. } => ErrorCode::PropagationTimeout,
            Self::CycleCheckTimeout { .. } => ErrorCode::CycleCheckTimeout,
            Self::DeadlineExceeded => ErrorCode::DeadlineExceeded,
            Self::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            Self::Publish(_) => ErrorCode::PublishFailed,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) | Self::Json(_) | Self::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// HTTP-like status number for this error.
    pub fn status(&self) -> u16 {
        match self.code() {
            ErrorCode::ComponentNotFound | ErrorCode::DependencyNotFound => 404,
            ErrorCode::DuplicateComponent
            | ErrorCode::DependentsExist
            | ErrorCode::CircularDependency
            | ErrorCode::DependencyConflict => 409,
            ErrorCode::SelfDependency | ErrorCode::ValidationFailed => 400,
            ErrorCode::AnalysisTimeout
            | ErrorCode::PropagationTimeout
            | ErrorCode::CycleCheckTimeout
            | ErrorCode::DeadlineExceeded => 504,
            ErrorCode::StoreUnavailable | ErrorCode::PublishFailed => 503,
            ErrorCode::ConfigError | ErrorCode::InternalError => 500,
        }
    }

    /// Returns `true` for errors raised by validation before any mutation.
    pub fn is_validation(&self) -> bool {
        matches!(self.status(), 400 | 404 | 409)
    }

    /// Render this error as a structured payload.
    pub fn payload(&self) -> ErrorPayload {
        use serde_json::json;

        let details = match self {
            Self::ComponentNotFound(id)
            | Self::DuplicateComponent(id)
            | Self::SelfDependency(id) => json!({ "component_id": id }),
            Self::DependentsExist {
                component_id,
                dependents,
            } => json!({ "component_id": component_id, "dependents": dependents }),
            Self::CircularDependency { from, to } | Self::CycleCheckTimeout { from, to } => {
                json!({ "source_component": from, "target_component": to })
            }
            Self::DependencyConflict { components, .. } => {
                json!({ "conflicting_components": components })
            }
            Self::DependencyNotFound { from, to, dep_type } => {
                json!({ "source_component": from, "target_component": to, "type": dep_type })
            }
            Self::InvalidComponent { field, .. } => json!({ "field": field }),
            Self::AnalysisTimeout { timeout_ms } => json!({ "timeout_ms": timeout_ms }),
            Self::PropagationTimeout {
                component_id,
                timeout_ms,
            } => json!({ "component_id": component_id, "timeout_ms": timeout_ms }),
            Self::Internal { correlation_id, .. } => json!({ "correlation_id": correlation_id }),
            Self::DeadlineExceeded
            | Self::StoreUnavailable(_)
            | Self::Publish(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Json(_) => serde_json::Value::Null,
        };

        ErrorPayload {
            code: self.code(),
            status: self.status(),
            message: self.to_string(),
            details,
        }
    }
}

/// A specialized Result type for ripple operations.
pub type Result<T> = std::result::Result<T, Error>;
