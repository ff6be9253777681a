//! Output formatting for CLI commands.
//!
//! This module provides utilities for formatting command output in both
//! human-readable text format and JSON format for programmatic use.
//!
//! Text renderers write to any [`Write`] so they can be tested without a
//! terminal; the `print_*` wrappers lock stdout.

pub mod color;

use crate::domain::{Component, Dependency, DependencyPath};
use crate::engine::ComponentDetails;
use crate::events::OutboundEvent;
use crate::impact::ImpactAnalysis;
use crate::inbound::InboundOutcome;
use crate::propagation::PropagationOutcome;
use crate::registry::UpdateOutcome;
use serde::Serialize;
use std::env;
use std::io::{self, Write};

pub use color::{error, success, warning};

use color::{bold, colorize_id, colorize_impact, colorize_risk, colorize_status, dimmed};

// ============================================================================
// Output Configuration
// ============================================================================

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create an OutputConfig by reading from environment variables.
    ///
    /// Reads:
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `RIPPLE_COLOR`: Set to "0" or "false" to disable colors (default: true)
    pub fn from_env() -> Self {
        // https://no-color.org/
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("RIPPLE_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);

        Self { use_colors }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { use_colors: true }
    }
}

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

// ============================================================================
// Public printing API
// ============================================================================

/// Print any serializable value as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_json(&mut handle, value)
}

/// Print a single component
pub fn print_component(component: &Component, mode: OutputMode) -> io::Result<()> {
    render(mode, component, |w, config| {
        write_component_line(w, component, config)
    })
}

/// Print a list of components
pub fn print_components(components: &[Component], mode: OutputMode) -> io::Result<()> {
    render(mode, components, |w, config| {
        write_components(w, components, config)
    })
}

/// Print a component with its direct edges (for the show command)
pub fn print_component_details(details: &ComponentDetails, mode: OutputMode) -> io::Result<()> {
    render(mode, details, |w, config| {
        write_component_details(w, details, config)
    })
}

/// Print a list of edges
pub fn print_dependencies(dependencies: &[Dependency], mode: OutputMode) -> io::Result<()> {
    render(mode, dependencies, |w, config| {
        write_dependencies(w, dependencies, config)
    })
}

/// Print a dependency path, or a note that none exists
pub fn print_path(path: Option<&DependencyPath>, mode: OutputMode) -> io::Result<()> {
    render(mode, &path, |w, config| match path {
        Some(path) if path.is_empty() => writeln!(w, "Source and target are the same component"),
        Some(path) => {
            let ids: Vec<String> = path
                .components()
                .iter()
                .map(|id| colorize_id(id.as_str(), config))
                .collect();
            writeln!(w, "{} ({} hops)", ids.join(" -> "), path.len())
        }
        None => writeln!(w, "No dependency path found"),
    })
}

/// Print the result of an update
pub fn print_update(outcome: &UpdateOutcome, mode: OutputMode) -> io::Result<()> {
    render(mode, outcome, |w, config| write_update(w, outcome, config))
}

/// Print the result of a propagation run
pub fn print_propagation(outcome: &PropagationOutcome, mode: OutputMode) -> io::Result<()> {
    render(mode, outcome, |w, config| {
        write_propagation(w, outcome, config)
    })
}

/// Print an impact analysis report
pub fn print_analysis(analysis: &ImpactAnalysis, mode: OutputMode) -> io::Result<()> {
    render(mode, analysis, |w, config| write_analysis(w, analysis, config))
}

/// Print what an inbound event did
pub fn print_inbound(line: usize, outcome: &InboundOutcome, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&serde_json::json!({ "line": line, "result": outcome })),
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let config = OutputConfig::from_env();
            write!(handle, "{} ", dimmed(&format!("line {line}:"), &config))?;
            write_inbound(&mut handle, outcome, &config)
        }
    }
}

/// Print outbound events, one per line
pub fn print_outbound(events: &[OutboundEvent], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            for event in events {
                serde_json::to_writer(&mut handle, event).map_err(io::Error::other)?;
                writeln!(handle)?;
            }
            Ok(())
        }
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let config = OutputConfig::from_env();
            for event in events {
                writeln!(
                    handle,
                    "  {} {} {}",
                    dimmed("->", &config),
                    event.topic(),
                    dimmed(event.event_id(), &config)
                )?;
            }
            Ok(())
        }
    }
}

/// Print a simple message
pub fn print_message(message: &str, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&serde_json::json!({ "message": message })),
        OutputMode::Text => {
            println!("{message}");
            Ok(())
        }
    }
}

fn render<T: Serialize + ?Sized>(
    mode: OutputMode,
    value: &T,
    text: impl FnOnce(&mut dyn Write, &OutputConfig) -> io::Result<()>,
) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match mode {
        OutputMode::Json => write_json(&mut handle, value),
        OutputMode::Text => {
            let w: &mut dyn Write = &mut handle;
            text(w, &OutputConfig::from_env())
        }
    }
}

fn write_json<T: Serialize + ?Sized>(w: &mut dyn Write, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *w, value).map_err(io::Error::other)?;
    writeln!(w)
}

// ============================================================================
// Text renderers
// ============================================================================

fn write_component_line(
    w: &mut dyn Write,
    component: &Component,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(
        w,
        "{} {} [{}] v{} {} {}",
        colorize_id(component.id.as_str(), config),
        component.name,
        component.component_type,
        component.version,
        colorize_status(component.status, config),
        dimmed(&format!("({})", component.project_id), config),
    )
}

fn write_components(
    w: &mut dyn Write,
    components: &[Component],
    config: &OutputConfig,
) -> io::Result<()> {
    if components.is_empty() {
        return writeln!(w, "No components found");
    }
    for component in components {
        write_component_line(w, component, config)?;
    }
    writeln!(w)?;
    writeln!(w, "{} component(s)", components.len())
}

fn write_edge(w: &mut dyn Write, dep: &Dependency, config: &OutputConfig) -> io::Result<()> {
    writeln!(
        w,
        "  {} -> {} {}",
        colorize_id(dep.source.as_str(), config),
        colorize_id(dep.target.as_str(), config),
        dimmed(&format!("[{}, {}]", dep.dep_type, dep.strength), config),
    )
}

fn write_dependencies(
    w: &mut dyn Write,
    dependencies: &[Dependency],
    config: &OutputConfig,
) -> io::Result<()> {
    if dependencies.is_empty() {
        return writeln!(w, "No dependencies");
    }
    for dep in dependencies {
        write_edge(w, dep, config)?;
    }
    Ok(())
}

fn write_component_details(
    w: &mut dyn Write,
    details: &ComponentDetails,
    config: &OutputConfig,
) -> io::Result<()> {
    let c = &details.component;
    writeln!(w, "{}", bold(&format!("{} ({})", c.name, c.id), config))?;
    writeln!(w, "  {} {}", dimmed("Type:   ", config), c.component_type)?;
    writeln!(w, "  {} {}", dimmed("Version:", config), c.version)?;
    writeln!(w, "  {} {}", dimmed("Status: ", config), colorize_status(c.status, config))?;
    writeln!(w, "  {} {}", dimmed("Project:", config), c.project_id)?;
    writeln!(
        w,
        "  {} {}",
        dimmed("Updated:", config),
        c.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;

    if !c.metadata.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", bold("Metadata", config))?;
        for (key, value) in &c.metadata {
            writeln!(w, "  {key} = {value}")?;
        }
    }

    writeln!(w)?;
    writeln!(w, "{} ({})", bold("Depends on", config), details.dependencies.len())?;
    for dep in &details.dependencies {
        write_edge(w, dep, config)?;
    }

    writeln!(w)?;
    writeln!(w, "{} ({})", bold("Required by", config), details.dependents.len())?;
    for dep in &details.dependents {
        write_edge(w, dep, config)?;
    }
    Ok(())
}

fn write_update(w: &mut dyn Write, outcome: &UpdateOutcome, config: &OutputConfig) -> io::Result<()> {
    let c = &outcome.component;
    if outcome.previous_version == c.version {
        writeln!(w, "{} {}", success("Updated", config), colorize_id(c.id.as_str(), config))?;
    } else {
        writeln!(
            w,
            "{} {} {} -> {}",
            success("Updated", config),
            colorize_id(c.id.as_str(), config),
            outcome.previous_version,
            c.version
        )?;
    }
    if let Some(propagation) = &outcome.propagation {
        write_propagation(w, propagation, config)?;
    }
    Ok(())
}

fn write_propagation(
    w: &mut dyn Write,
    outcome: &PropagationOutcome,
    config: &OutputConfig,
) -> io::Result<()> {
    if outcome.affected.is_empty() {
        return writeln!(w, "No dependents to propagate to");
    }

    let ids: Vec<String> = outcome
        .affected
        .iter()
        .map(|id| colorize_id(id.as_str(), config))
        .collect();
    writeln!(
        w,
        "{} propagation reached {} component(s), depth {}: {}",
        outcome.propagation_type,
        outcome.affected.len(),
        outcome.depth,
        ids.join(", ")
    )?;
    if outcome.truncated {
        writeln!(
            w,
            "{}",
            warning("Propagation stopped at the maximum depth; more dependents exist", config)
        )?;
    }
    Ok(())
}

fn write_analysis(
    w: &mut dyn Write,
    analysis: &ImpactAnalysis,
    config: &OutputConfig,
) -> io::Result<()> {
    let summary = &analysis.impact_summary;
    let risk = &analysis.risk_assessment;
    let effort = &analysis.estimated_effort;

    writeln!(w, "{}", bold(&format!("Impact analysis {}", analysis.analysis_id), config))?;
    writeln!(
        w,
        "  {} {} ({} direct, {} indirect)",
        dimmed("Affected:", config),
        summary.total_components_affected,
        summary.direct_impact,
        summary.indirect_impact
    )?;
    writeln!(w, "  {} {}", dimmed("Risk:    ", config), colorize_risk(risk.overall_risk, config))?;
    writeln!(
        w,
        "  {} {}h, {} developer(s)",
        dimmed("Effort:  ", config),
        effort.estimated_hours,
        effort.developer_count
    )?;

    if !analysis.affected_components.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", bold("Affected components", config))?;
        for affected in &analysis.affected_components {
            writeln!(
                w,
                "  {:<8} {} {}",
                colorize_impact(affected.impact_level, config),
                colorize_id(affected.component_id.as_str(), config),
                dimmed(
                    &format!("({} hop(s) from {})", affected.hops, affected.reached_from),
                    config
                ),
            )?;
        }
    }

    if !risk.identified_risks.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", bold("Risks", config))?;
        for r in &risk.identified_risks {
            writeln!(w, "  {} {}: {}", colorize_risk(r.level, config), r.risk_type, r.description)?;
            if let Some(mitigation) = risk.mitigation_strategies.get(&r.risk_type) {
                writeln!(w, "    {}", dimmed(mitigation, config))?;
            }
        }
    }

    if !analysis.recommendations.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", bold("Recommendations", config))?;
        for recommendation in &analysis.recommendations {
            writeln!(w, "  - {recommendation}")?;
        }
    }
    Ok(())
}

fn write_inbound(w: &mut dyn Write, outcome: &InboundOutcome, config: &OutputConfig) -> io::Result<()> {
    match outcome {
        InboundOutcome::Created { component } => writeln!(
            w,
            "{} {}",
            success("created", config),
            colorize_id(component.id.as_str(), config)
        ),
        InboundOutcome::Updated { update } => write_update(w, update, config),
        InboundOutcome::Deleted { component } => writeln!(
            w,
            "{} {}",
            success("deleted", config),
            colorize_id(component.id.as_str(), config)
        ),
        InboundOutcome::DependencyAdded { dependency } => {
            writeln!(w, "{} {dependency}", success("added", config))
        }
        InboundOutcome::DependencyRemoved { dependency } => {
            writeln!(w, "{} {dependency}", success("removed", config))
        }
        InboundOutcome::Registered { components } => writeln!(
            w,
            "{} {} component(s)",
            success("registered", config),
            components.len()
        ),
        InboundOutcome::Propagated { propagation } => write_propagation(w, propagation, config),
        InboundOutcome::Duplicate { event_id } => {
            writeln!(w, "{}", dimmed(&format!("duplicate event {event_id} skipped"), config))
        }
        InboundOutcome::Ignored { reason } => {
            writeln!(w, "{}", dimmed(&format!("ignored: {reason}"), config))
        }
    }
}
