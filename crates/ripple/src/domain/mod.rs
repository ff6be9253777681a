//! Domain types for the component dependency graph.
//!
//! A [`Component`] is one generated artifact of a project. A [`Dependency`]
//! is a directed, typed edge meaning "source requires target". Both are plain
//! data keyed by stable string ids; the graph structure itself lives in
//! [`crate::storage`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque key/value metadata attached to components and dependencies.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Metadata key that marks an update as breaking for its dependents.
pub const BREAKING_CHANGE_KEY: &str = "breakingChange";

/// Every spelling of [`BREAKING_CHANGE_KEY`] that is honored on input.
pub const BREAKING_CHANGE_KEYS: [&str; 2] = [BREAKING_CHANGE_KEY, "breaking_change"];

/// Maximum length of a component id.
pub const MAX_COMPONENT_ID_LENGTH: usize = 128;

/// Globally unique, immutable identifier of a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    /// Create a new component ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ComponentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ComponentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Unique identifier, assigned by the caller
    pub id: ComponentId,

    /// Human readable name
    pub name: String,

    /// Kind of artifact
    #[serde(rename = "type")]
    pub component_type: ComponentType,

    /// Semantic version string
    pub version: String,

    /// Project this component belongs to (immutable)
    pub project_id: String,

    /// Lifecycle status
    pub status: ComponentStatus,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Component {
    /// Returns `true` if the metadata flags this component's last change as breaking.
    pub fn is_breaking(&self) -> bool {
        breaking_flag(&self.metadata)
    }

    /// Apply a partial update in place and refresh `updated_at`.
    ///
    /// The update is assumed to be validated already.
    pub fn apply_update(&mut self, update: &ComponentUpdate, now: DateTime<Utc>) {
        if let Some(version) = &update.version {
            self.version.clone_from(version);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(entries) = &update.metadata {
            for (key, value) in entries {
                if value.is_null() {
                    self.metadata.remove(key);
                } else {
                    self.metadata.insert(key.clone(), value.clone());
                }
            }
        }
        self.updated_at = now;
    }
}

/// Kind of generated artifact a component represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentType {
    /// User-facing frontend module
    Frontend,
    /// Backend service code
    Backend,
    /// Database schema
    Database,
    /// API definition
    Api,
    /// Standalone service
    Service,
    /// Shared library
    Library,
    /// Configuration unit
    Configuration,
    /// Infrastructure definition
    Infrastructure,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Frontend => "FRONTEND",
            Self::Backend => "BACKEND",
            Self::Database => "DATABASE",
            Self::Api => "API",
            Self::Service => "SERVICE",
            Self::Library => "LIBRARY",
            Self::Configuration => "CONFIGURATION",
            Self::Infrastructure => "INFRASTRUCTURE",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ComponentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FRONTEND" => Ok(Self::Frontend),
            "BACKEND" => Ok(Self::Backend),
            "DATABASE" => Ok(Self::Database),
            "API" => Ok(Self::Api),
            "SERVICE" => Ok(Self::Service),
            "LIBRARY" => Ok(Self::Library),
            "CONFIGURATION" => Ok(Self::Configuration),
            "INFRASTRUCTURE" => Ok(Self::Infrastructure),
            other => Err(format!("unknown component type '{other}'")),
        }
    }
}

/// Lifecycle status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentStatus {
    /// In use
    Active,
    /// Still present, scheduled for removal
    Deprecated,
    /// Removed from the project
    Deleted,
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "ACTIVE",
            Self::Deprecated => "DEPRECATED",
            Self::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

/// A directed edge `source -> target` ("source requires target").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// The dependent component
    pub source: ComponentId,

    /// The component being depended upon
    pub target: ComponentId,

    /// Kind of relationship
    #[serde(rename = "type")]
    pub dep_type: DependencyType,

    /// Whether a change to `target` is assumed to break `source`
    #[serde(default)]
    pub strength: DependencyStrength,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl Dependency {
    /// The identity of an edge. At most one edge per key may exist.
    pub fn key(&self) -> (&ComponentId, &ComponentId, DependencyType) {
        (&self.source, &self.target, self.dep_type)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --[{}]--> {}", self.source, self.dep_type, self.target)
    }
}

/// Type of dependency relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyType {
    /// Needed to build
    Compile,
    /// Needed at runtime
    Runtime,
    /// Needed only by tests
    Test,
    /// Supplied by the environment
    Provided,
    /// Source-level import
    Import,
    /// Remote API call
    ApiCall,
    /// Shares a database
    Database,
    /// Reads configuration
    Configuration,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Compile => "COMPILE",
            Self::Runtime => "RUNTIME",
            Self::Test => "TEST",
            Self::Provided => "PROVIDED",
            Self::Import => "IMPORT",
            Self::ApiCall => "API_CALL",
            Self::Database => "DATABASE",
            Self::Configuration => "CONFIGURATION",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "COMPILE" => Ok(Self::Compile),
            "RUNTIME" => Ok(Self::Runtime),
            "TEST" => Ok(Self::Test),
            "PROVIDED" => Ok(Self::Provided),
            "IMPORT" => Ok(Self::Import),
            "API_CALL" => Ok(Self::ApiCall),
            "DATABASE" => Ok(Self::Database),
            "CONFIGURATION" => Ok(Self::Configuration),
            other => Err(format!("unknown dependency type '{other}'")),
        }
    }
}

/// How strongly a dependent is coupled to its dependency.
///
/// Ordered `Optional < Weak < Strong`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyStrength {
    /// Changes are unlikely to affect the dependent
    Optional,
    /// Changes might affect the dependent
    Weak,
    /// Breaking changes will affect the dependent
    #[default]
    Strong,
}

impl fmt::Display for DependencyStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Optional => "OPTIONAL",
            Self::Weak => "WEAK",
            Self::Strong => "STRONG",
        };
        f.write_str(s)
    }
}

/// Data for registering a new component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComponent {
    /// Caller-assigned unique id
    pub id: ComponentId,

    /// Human readable name
    pub name: String,

    /// Kind of artifact
    #[serde(rename = "type")]
    pub component_type: ComponentType,

    /// Initial version
    pub version: String,

    /// Owning project
    pub project_id: String,

    /// Initial metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewComponent {
    /// Convenience constructor with empty metadata.
    pub fn new(
        id: impl Into<ComponentId>,
        name: impl Into<String>,
        component_type: ComponentType,
        version: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            component_type,
            version: version.into(),
            project_id: project_id.into(),
            metadata: Metadata::new(),
        }
    }

    /// Validate the new component's fields.
    ///
    /// Returns `(field, reason)` for the first invalid field.
    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        validate_component_id(&self.id).map_err(|e| ("id", e))?;
        if self.name.trim().is_empty() {
            return Err(("name", "cannot be empty".to_string()));
        }
        if self.project_id.trim().is_empty() {
            return Err(("project_id", "cannot be empty".to_string()));
        }
        validate_version(&self.version).map_err(|e| ("version", e))?;
        Ok(())
    }

    /// Build the stored component with status `ACTIVE` and both timestamps set to `now`.
    pub fn into_component(self, now: DateTime<Utc>) -> Component {
        Component {
            id: self.id,
            name: self.name,
            component_type: self.component_type,
            version: self.version,
            project_id: self.project_id,
            status: ComponentStatus::Active,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a component.
///
/// Only fields that are `Some` are applied. Metadata entries are merged into
/// the existing map; an entry whose value is `null` removes that key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentUpdate {
    /// New version (if updating)
    pub version: Option<String>,

    /// New status (if updating)
    pub status: Option<ComponentStatus>,

    /// Metadata entries to merge (if updating)
    pub metadata: Option<Metadata>,
}

impl ComponentUpdate {
    /// Returns `true` if the update carries a truthy `breakingChange` (or
    /// `breaking_change`) metadata flag.
    pub fn is_breaking(&self) -> bool {
        self.metadata.as_ref().is_some_and(breaking_flag)
    }

    /// Returns `true` if no field would be changed.
    pub fn is_empty(&self) -> bool {
        self.version.is_none() && self.status.is_none() && self.metadata.is_none()
    }
}

/// Data for adding a dependency edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDependency {
    /// The dependent component
    pub source: ComponentId,

    /// The component being depended upon
    pub target: ComponentId,

    /// Kind of relationship
    #[serde(rename = "type")]
    pub dep_type: DependencyType,

    /// Coupling strength
    #[serde(default)]
    pub strength: DependencyStrength,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewDependency {
    /// A `STRONG` edge with no metadata.
    pub fn new(
        source: impl Into<ComponentId>,
        target: impl Into<ComponentId>,
        dep_type: DependencyType,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            dep_type,
            strength: DependencyStrength::Strong,
            metadata: Metadata::new(),
        }
    }

    /// Set the coupling strength.
    #[must_use]
    pub fn with_strength(mut self, strength: DependencyStrength) -> Self {
        self.strength = strength;
        self
    }

    /// Stamp the edge with its creation time.
    pub fn into_dependency(self, now: DateTime<Utc>) -> Dependency {
        Dependency {
            source: self.source,
            target: self.target,
            dep_type: self.dep_type,
            strength: self.strength,
            created_at: now,
            metadata: self.metadata,
        }
    }
}

/// Filter for listing components
#[derive(Debug, Clone, Default)]
pub struct ComponentFilter {
    /// Filter by project
    pub project_id: Option<String>,

    /// Filter by type
    pub component_type: Option<ComponentType>,

    /// Filter by status
    pub status: Option<ComponentStatus>,
}

impl ComponentFilter {
    /// Returns `true` if the component passes every set criterion.
    pub fn matches(&self, component: &Component) -> bool {
        if let Some(project_id) = &self.project_id {
            if &component.project_id != project_id {
                return false;
            }
        }
        if let Some(component_type) = self.component_type {
            if component.component_type != component_type {
                return false;
            }
        }
        if let Some(status) = self.status {
            if component.status != status {
                return false;
            }
        }
        true
    }
}

/// A chain of edges leading from one component to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyPath {
    /// Edges in traversal order; `edges[i].target == edges[i + 1].source`
    pub edges: Vec<Dependency>,
}

impl DependencyPath {
    /// Number of hops in the path.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` for the zero-hop path (source == target).
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Component ids visited by the path, endpoints included.
    pub fn components(&self) -> Vec<&ComponentId> {
        let mut ids: Vec<&ComponentId> = Vec::with_capacity(self.edges.len() + 1);
        if let Some(first) = self.edges.first() {
            ids.push(&first.source);
        }
        ids.extend(self.edges.iter().map(|e| &e.target));
        ids
    }
}

impl fmt::Display for DependencyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.components().iter().map(|id| id.as_str()).collect();
        f.write_str(&ids.join(" -> "))
    }
}

fn breaking_flag(metadata: &Metadata) -> bool {
    BREAKING_CHANGE_KEYS
        .iter()
        .any(|key| metadata_flag(metadata, key))
}

fn metadata_flag(metadata: &Metadata, key: &str) -> bool {
    match metadata.get(key) {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(serde_json::Value::Null) | None => false,
        Some(_) => true,
    }
}

/// Validate a component id: non-empty, bounded, no whitespace.
pub fn validate_component_id(id: &ComponentId) -> Result<(), String> {
    let s = id.as_str();
    if s.is_empty() {
        return Err("cannot be empty".to_string());
    }
    if s.len() > MAX_COMPONENT_ID_LENGTH {
        return Err(format!(
            "cannot exceed {MAX_COMPONENT_ID_LENGTH} characters (got {})",
            s.len()
        ));
    }
    if s.chars().any(char::is_whitespace) {
        return Err("cannot contain whitespace".to_string());
    }
    Ok(())
}

/// Validate a semantic version string.
///
/// Accepts `MAJOR[.MINOR[.PATCH]]` with an optional leading `v` and an
/// optional `-pre-release` or `+build` suffix.
pub fn validate_version(version: &str) -> Result<(), String> {
    let trimmed = version.strip_prefix('v').unwrap_or(version);
    let core = trimmed
        .split(['-', '+'])
        .next()
        .unwrap_or_default();

    if core.is_empty() {
        return Err(format!("'{version}' is not a semantic version"));
    }

    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(format!("'{version}' is not a semantic version"));
    }

    if trimmed.len() > core.len() && trimmed.len() == core.len() + 1 {
        return Err(format!("'{version}' has an empty pre-release or build suffix"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.0.0")]
    #[case("2.1")]
    #[case("3")]
    #[case("v1.2.3")]
    #[case("1.0.0-beta.1")]
    #[case("1.0.0+build5")]
    fn test_valid_versions(#[case] version: &str) {
        assert!(validate_version(version).is_ok(), "{version} should be valid");
    }

    #[rstest]
    #[case("")]
    #[case("latest")]
    #[case("1..0")]
    #[case("1.0.0.0")]
    #[case("1.0.0-")]
    #[case("1.x")]
    fn test_invalid_versions(#[case] version: &str) {
        assert!(validate_version(version).is_err(), "{version} should be invalid");
    }

    #[test]
    fn test_new_component_validation() {
        let valid = NewComponent::new("auth", "Auth", ComponentType::Service, "1.0.0", "p1");
        assert!(valid.validate().is_ok());

        let mut blank_name = valid.clone();
        blank_name.name = "  ".to_string();
        assert_eq!(blank_name.validate().unwrap_err().0, "name");

        let mut spaced_id = valid.clone();
        spaced_id.id = ComponentId::new("auth service");
        assert_eq!(spaced_id.validate().unwrap_err().0, "id");

        let mut bad_version = valid;
        bad_version.version = "next".to_string();
        assert_eq!(bad_version.validate().unwrap_err().0, "version");
    }

    #[test]
    fn test_breaking_flag_detection() {
        let mut update = ComponentUpdate::default();
        assert!(!update.is_breaking());

        let mut metadata = Metadata::new();
        metadata.insert(BREAKING_CHANGE_KEY.to_string(), serde_json::json!(true));
        update.metadata = Some(metadata.clone());
        assert!(update.is_breaking());

        metadata.insert(BREAKING_CHANGE_KEY.to_string(), serde_json::json!("false"));
        update.metadata = Some(metadata);
        assert!(!update.is_breaking());
    }

    #[rstest]
    #[case::camel_case("breakingChange")]
    #[case::snake_case("breaking_change")]
    fn test_breaking_flag_accepts_both_spellings(#[case] key: &str) {
        let mut metadata = Metadata::new();
        metadata.insert(key.to_string(), serde_json::json!(true));
        let update = ComponentUpdate {
            metadata: Some(metadata),
            ..ComponentUpdate::default()
        };
        assert!(update.is_breaking());
    }

    #[test]
    fn test_apply_update_merges_metadata() {
        let created = Utc::now();
        let mut new = NewComponent::new("api", "API", ComponentType::Api, "1.0.0", "p1");
        new.metadata.insert("owner".to_string(), serde_json::json!("team-a"));
        new.metadata.insert("tier".to_string(), serde_json::json!(1));
        let mut component = new.into_component(created);

        let mut entries = Metadata::new();
        entries.insert("owner".to_string(), serde_json::Value::Null);
        entries.insert("region".to_string(), serde_json::json!("eu"));
        let update = ComponentUpdate {
            version: Some("1.1.0".to_string()),
            metadata: Some(entries),
            ..Default::default()
        };

        let later = created + chrono::Duration::seconds(5);
        component.apply_update(&update, later);

        assert_eq!(component.version, "1.1.0");
        assert_eq!(component.status, ComponentStatus::Active);
        assert!(!component.metadata.contains_key("owner"));
        assert_eq!(component.metadata["tier"], serde_json::json!(1));
        assert_eq!(component.metadata["region"], serde_json::json!("eu"));
        assert_eq!(component.created_at, created);
        assert_eq!(component.updated_at, later);
    }

    #[test]
    fn test_strength_ordering() {
        assert!(DependencyStrength::Optional < DependencyStrength::Weak);
        assert!(DependencyStrength::Weak < DependencyStrength::Strong);
        assert_eq!(DependencyStrength::default(), DependencyStrength::Strong);
    }

    #[test]
    fn test_enum_wire_format() {
        let json = serde_json::to_string(&DependencyType::ApiCall).unwrap();
        assert_eq!(json, "\"API_CALL\"");
        let parsed: ComponentType = serde_json::from_str("\"INFRASTRUCTURE\"").unwrap();
        assert_eq!(parsed, ComponentType::Infrastructure);
        assert_eq!("api-call".parse::<DependencyType>().unwrap(), DependencyType::ApiCall);
    }

    #[test]
    fn test_path_display() {
        let now = Utc::now();
        let path = DependencyPath {
            edges: vec![
                NewDependency::new("a", "b", DependencyType::Compile).into_dependency(now),
                NewDependency::new("b", "c", DependencyType::Runtime).into_dependency(now),
            ],
        };
        assert_eq!(path.len(), 2);
        assert_eq!(path.to_string(), "a -> b -> c");
    }
}
