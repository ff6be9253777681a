//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Success:   green   (ACTIVE status, completed actions)
//!   - Warning:   yellow  (DEPRECATED status, HIGH impact, MODERATE risk)
//!   - Error:     red     (CRITICAL impact, HIGH/SEVERE risk)
//!   - Reference: cyan    (component IDs)
//!   - Muted:     dimmed  (field labels, LOW impact)
//!   - Emphasis:  bold    (section headers)

use crate::domain::ComponentStatus;
use crate::impact::{ImpactLevel, RiskLevel};
use colored::Colorize;

use super::OutputConfig;

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

/// Apply semantic "error" color (red) to text.
pub fn error(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.red().to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Colorize a component ID (cyan).
pub(crate) fn colorize_id(id: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return id.to_string();
    }
    id.cyan().to_string()
}

/// Apply color to a component status.
pub(crate) fn colorize_status(status: ComponentStatus, config: &OutputConfig) -> String {
    let text = status.to_string();
    if !config.use_colors {
        return text;
    }
    match status {
        ComponentStatus::Active => text.green().to_string(),
        ComponentStatus::Deprecated => text.yellow().to_string(),
        ComponentStatus::Deleted => text.red().to_string(),
    }
}

/// Wire name of an impact level.
pub(crate) fn impact_label(level: ImpactLevel) -> &'static str {
    match level {
        ImpactLevel::None => "NONE",
        ImpactLevel::Low => "LOW",
        ImpactLevel::Medium => "MEDIUM",
        ImpactLevel::High => "HIGH",
        ImpactLevel::Critical => "CRITICAL",
    }
}

/// Apply color to an impact level.
pub(crate) fn colorize_impact(level: ImpactLevel, config: &OutputConfig) -> String {
    let text = impact_label(level);
    if !config.use_colors {
        return text.to_string();
    }
    match level {
        ImpactLevel::Critical => text.red().bold().to_string(),
        ImpactLevel::High => text.yellow().to_string(),
        ImpactLevel::Medium => text.to_string(),
        ImpactLevel::Low | ImpactLevel::None => text.dimmed().to_string(),
    }
}

/// Apply color to a risk level.
pub(crate) fn colorize_risk(level: RiskLevel, config: &OutputConfig) -> String {
    let text = level.to_string();
    if !config.use_colors {
        return text;
    }
    match level {
        RiskLevel::Severe | RiskLevel::High => text.red().bold().to_string(),
        RiskLevel::Moderate => text.yellow().to_string(),
        RiskLevel::Low | RiskLevel::Minimal => text.green().to_string(),
    }
}

/// Bold text.
pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}

/// Dimmed text.
pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}
