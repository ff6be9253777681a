//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time, providing immediate feedback for invalid values.
//! They delegate to the domain validators so the rules live in one place.

use crate::domain::{self, ComponentId};
use serde_json::Value;

/// Validate a component id.
pub fn validate_component_id(s: &str) -> Result<ComponentId, String> {
    let id = ComponentId::new(s.trim());
    domain::validate_component_id(&id)?;
    Ok(id)
}

/// Validate a version string.
pub fn validate_version(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    domain::validate_version(trimmed)?;
    Ok(trimmed.to_string())
}

/// Validate a non-blank free-text value (project id, description).
pub fn validate_non_empty(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("Value cannot be empty".to_string());
    }
    Ok(trimmed.to_string())
}

/// Parse a `key=value` metadata entry.
///
/// The value is read as JSON when it parses (`true`, `3`, `{"a":1}`) and
/// kept as a plain string otherwise.
pub fn parse_metadata_entry(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid metadata '{s}'. Expected key=value"))?;

    let key = key.trim();
    if key.is_empty() {
        return Err("Metadata key cannot be empty".to_string());
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("web")]
    #[case("  user-service ")]
    fn test_validate_component_id_accepts(#[case] input: &str) {
        assert!(validate_component_id(input).is_ok());
    }

    #[test]
    fn test_validate_component_id_rejects_blank() {
        assert!(validate_component_id("   ").is_err());
    }

    #[rstest]
    #[case("breaking_change=true", "breaking_change", Value::Bool(true))]
    #[case("owner=team-a", "owner", Value::String("team-a".into()))]
    #[case("replicas=3", "replicas", Value::from(3))]
    fn test_parse_metadata_entry(#[case] input: &str, #[case] key: &str, #[case] value: Value) {
        assert_eq!(parse_metadata_entry(input).unwrap(), (key.to_string(), value));
    }

    #[test]
    fn test_parse_metadata_entry_requires_equals() {
        assert!(parse_metadata_entry("owner").is_err());
        assert!(parse_metadata_entry("=x").is_err());
    }
}
