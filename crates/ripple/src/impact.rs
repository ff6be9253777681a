//! Impact Analyzer: estimate the blast radius of a proposed change.
//!
//! Analysis is read-only. For each target it walks **dependencies** depth
//! first, up to the hop bound of the requested [`AnalysisDepth`], and grades
//! every reached component by its hop distance:
//!
//! | hops | level    |
//! |------|----------|
//! | 0    | CRITICAL |
//! | 1    | HIGH     |
//! | 2    | MEDIUM   |
//! | 3+   | LOW      |
//!
//! A component reached from an earlier target keeps its first grade and is
//! not descended again. Targets that don't exist or belong to another project
//! are skipped; a request whose targets are all skipped yields an empty
//! analysis rather than an error.

use crate::domain::{ComponentId, ComponentType};
use crate::error::{Error, Result};
use crate::events::{AnalysisEvent, AnalysisType, EventSink, next_event_id, publish_or_log};
use crate::storage::{Deadline, GraphStore, WalkEntry};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// More affected components than this suggests a phased rollout.
pub const PHASED_ROLLOUT_THRESHOLD: usize = 10;

/// Number of critical paths reported in the summary.
pub const MAX_CRITICAL_PATHS: usize = 3;

/// Working hours per developer-week, used to size the team.
const HOURS_PER_DEVELOPER: u32 = 40;

/// Upper bound on the suggested developer count.
const MAX_DEVELOPERS: u32 = 5;

/// How far an analysis walks from each target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisDepth {
    /// Direct dependencies only (1 hop)
    Shallow,
    /// Up to 2 hops
    #[default]
    Normal,
    /// Full dependency tree
    Deep,
}

impl AnalysisDepth {
    /// Hop bound, `None` for unbounded.
    pub fn max_hops(self) -> Option<usize> {
        match self {
            Self::Shallow => Some(1),
            Self::Normal => Some(2),
            Self::Deep => None,
        }
    }
}

/// Category of the proposed change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    /// New feature
    FeatureAdd,
    /// Change to an existing feature
    #[default]
    FeatureModify,
    /// Feature removal
    FeatureRemove,
    /// Behavior-preserving restructuring
    Refactor,
    /// Defect fix
    BugFix,
    /// Performance work
    Performance,
    /// Security-related change
    Security,
    /// Third-party dependency bump
    DependencyUpdate,
}

/// Severity of the impact on one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactLevel {
    /// Not affected
    None,
    /// Affected at 3 or more hops
    Low,
    /// Affected at 2 hops
    Medium,
    /// Affected at 1 hop
    High,
    /// A target itself
    Critical,
}

impl ImpactLevel {
    /// Grade by hop distance from the target.
    pub fn from_hops(hops: usize) -> Self {
        match hops {
            0 => Self::Critical,
            1 => Self::High,
            2 => Self::Medium,
            _ => Self::Low,
        }
    }

    /// Remediation cost in hours.
    pub fn effort_hours(self) -> u32 {
        match self {
            Self::Critical => 16,
            Self::High => 8,
            Self::Medium => 4,
            Self::Low => 2,
            Self::None => 0,
        }
    }
}

/// Severity of a risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Nothing identified
    Minimal,
    /// Low risk
    Low,
    /// Moderate risk
    Moderate,
    /// High risk
    High,
    /// Severe risk
    Severe,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Minimal => "MINIMAL",
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
            Self::Severe => "SEVERE",
        };
        f.write_str(s)
    }
}

/// A proposed change to analyse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactRequest {
    /// Project the targets belong to
    pub project_id: String,
    /// What the change is
    pub change_description: String,
    /// Category of the change
    #[serde(default)]
    pub change_type: ChangeType,
    /// Components the change touches directly
    pub target_components: Vec<ComponentId>,
    /// How far to walk from each target
    #[serde(default)]
    pub analysis_depth: AnalysisDepth,
}

impl ImpactRequest {
    /// A NORMAL-depth request for a feature modification.
    pub fn new(
        project_id: impl Into<String>,
        change_description: impl Into<String>,
        target_components: Vec<ComponentId>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            change_description: change_description.into(),
            change_type: ChangeType::default(),
            target_components,
            analysis_depth: AnalysisDepth::default(),
        }
    }

    /// Set the analysis depth.
    #[must_use]
    pub fn with_depth(mut self, depth: AnalysisDepth) -> Self {
        self.analysis_depth = depth;
        self
    }

    /// Set the change category.
    #[must_use]
    pub fn with_change_type(mut self, change_type: ChangeType) -> Self {
        self.change_type = change_type;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(Error::InvalidComponent {
                field: "project_id",
                reason: "is required".to_string(),
            });
        }
        if self.change_description.trim().is_empty() {
            return Err(Error::InvalidComponent {
                field: "change_description",
                reason: "is required".to_string(),
            });
        }
        Ok(())
    }
}

/// One component reached by the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectedComponent {
    /// Affected component
    pub component_id: ComponentId,
    /// Its name
    pub component_name: String,
    /// Its type
    pub component_type: ComponentType,
    /// Grade
    pub impact_level: ImpactLevel,
    /// Hops from the target that reached it
    pub hops: usize,
    /// The target that reached it
    pub reached_from: ComponentId,
}

/// Headline numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImpactSummary {
    /// Number of affected components
    pub total_components_affected: usize,
    /// CRITICAL entries
    pub direct_impact: usize,
    /// Every other entry
    pub indirect_impact: usize,
    /// Up to three descriptions of CRITICAL/HIGH components
    pub critical_paths: Vec<String>,
}

/// One identified risk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Risk {
    /// Short category name
    pub risk_type: String,
    /// Severity
    pub level: RiskLevel,
    /// What was found
    pub description: String,
    /// Estimated likelihood, 0.0 to 1.0
    pub probability: f64,
}

/// Aggregated risk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    /// Highest level among the identified risks, MINIMAL if none
    pub overall_risk: RiskLevel,
    /// Every identified risk
    pub identified_risks: Vec<Risk>,
    /// Mitigation per risk type
    pub mitigation_strategies: BTreeMap<String, String>,
}

/// Remediation effort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffortEstimate {
    /// Sum of per-component hours
    pub estimated_hours: u32,
    /// Suggested team size, 1 to 5
    pub developer_count: u32,
    /// Hours per affected component
    pub effort_by_component: BTreeMap<ComponentId, u32>,
}

/// Result of one analysis. Ephemeral: returned to the caller, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactAnalysis {
    /// Unique id of this analysis
    pub analysis_id: String,
    /// Analysed project
    pub project_id: String,
    /// Headline numbers
    pub impact_summary: ImpactSummary,
    /// Every reached component, in walk order
    pub affected_components: Vec<AffectedComponent>,
    /// Aggregated risk
    pub risk_assessment: RiskAssessment,
    /// Deterministic recommendations
    pub recommendations: Vec<String>,
    /// Remediation effort
    pub estimated_effort: EffortEstimate,
}

impl ImpactAnalysis {
    /// Level of a component in this analysis, `NONE` if it wasn't reached.
    pub fn level_of(&self, id: &ComponentId) -> ImpactLevel {
        self.affected_components
            .iter()
            .find(|c| &c.component_id == id)
            .map_or(ImpactLevel::None, |c| c.impact_level)
    }
}

/// Runs impact analyses against the store.
#[derive(Clone)]
pub struct ImpactAnalyzer {
    store: Arc<dyn GraphStore>,
    events: Arc<dyn EventSink>,
    timeout: Duration,
    publish_events: bool,
}

impl std::fmt::Debug for ImpactAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImpactAnalyzer")
            .field("timeout", &self.timeout)
            .field("publish_events", &self.publish_events)
            .finish_non_exhaustive()
    }
}

impl ImpactAnalyzer {
    /// Create an analyzer.
    pub fn new(
        store: Arc<dyn GraphStore>,
        events: Arc<dyn EventSink>,
        timeout: Duration,
        publish_events: bool,
    ) -> Self {
        Self {
            store,
            events,
            timeout,
            publish_events,
        }
    }

    /// Analyse a proposed change without mutating anything.
    ///
    /// # Errors
    ///
    /// - `InvalidComponent` if the project id or description is blank
    /// - `AnalysisTimeout` if the walk outlives the configured deadline
    /// - any store error, unretried
    pub async fn analyze(&self, request: &ImpactRequest) -> Result<ImpactAnalysis> {
        request.validate()?;
        info!(
            project_id = %request.project_id,
            targets = request.target_components.len(),
            depth = ?request.analysis_depth,
            "Analyzing change impact"
        );

        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let deadline = Deadline::after(self.timeout);
        let affected = tokio::time::timeout(self.timeout, self.affected_components(request, deadline))
            .await
            .map_err(|_| Error::AnalysisTimeout { timeout_ms })?
            .map_err(|e| match e {
                Error::DeadlineExceeded => Error::AnalysisTimeout { timeout_ms },
                other => other,
            })?;

        let risk_assessment = assess_risks(&affected, request.change_type);
        let analysis = ImpactAnalysis {
            analysis_id: next_event_id("analysis", &[request.project_id.as_str()], Utc::now()),
            project_id: request.project_id.clone(),
            impact_summary: summarize(&affected),
            recommendations: recommend(affected.len(), risk_assessment.overall_risk),
            estimated_effort: estimate_effort(&affected),
            risk_assessment,
            affected_components: affected,
        };

        info!(
            analysis_id = %analysis.analysis_id,
            affected = analysis.affected_components.len(),
            overall_risk = %analysis.risk_assessment.overall_risk,
            "Impact analysis complete"
        );

        if self.publish_events {
            publish_or_log(self.events.as_ref(), analysis_event(&analysis)).await;
        }

        Ok(analysis)
    }

    async fn affected_components(
        &self,
        request: &ImpactRequest,
        deadline: Deadline,
    ) -> Result<Vec<AffectedComponent>> {
        let mut roots = Vec::with_capacity(request.target_components.len());
        for target in &request.target_components {
            match self.store.get_component(target).await? {
                Some(component) if component.project_id == request.project_id => {
                    roots.push(target.clone());
                }
                Some(component) => warn!(
                    component_id = %target,
                    project_id = %component.project_id,
                    requested_project = %request.project_id,
                    "Skipping target from another project"
                ),
                None => warn!(component_id = %target, "Skipping unknown target"),
            }
        }

        if roots.is_empty() {
            debug!(project_id = %request.project_id, "No resolvable targets");
            return Ok(Vec::new());
        }

        let walk = self
            .store
            .dependency_walk(
                &roots,
                Some(&request.project_id),
                request.analysis_depth.max_hops(),
                deadline,
            )
            .await?;

        Ok(walk.into_iter().map(AffectedComponent::from).collect())
    }
}

impl From<WalkEntry> for AffectedComponent {
    fn from(entry: WalkEntry) -> Self {
        Self {
            component_id: entry.component.id,
            component_name: entry.component.name,
            component_type: entry.component.component_type,
            impact_level: ImpactLevel::from_hops(entry.hops),
            hops: entry.hops,
            reached_from: entry.root,
        }
    }
}

fn summarize(affected: &[AffectedComponent]) -> ImpactSummary {
    let direct_impact = affected
        .iter()
        .filter(|c| c.impact_level == ImpactLevel::Critical)
        .count();

    let critical_paths = affected
        .iter()
        .filter(|c| c.impact_level >= ImpactLevel::High)
        .map(|c| format!("{} dependency chain", c.component_name))
        .take(MAX_CRITICAL_PATHS)
        .collect();

    ImpactSummary {
        total_components_affected: affected.len(),
        direct_impact,
        indirect_impact: affected.len() - direct_impact,
        critical_paths,
    }
}

fn assess_risks(affected: &[AffectedComponent], change_type: ChangeType) -> RiskAssessment {
    let mut risks = Vec::new();
    let mut mitigation_strategies = BTreeMap::new();

    let critical = affected
        .iter()
        .filter(|c| c.impact_level == ImpactLevel::Critical)
        .count();
    if critical > 0 {
        risks.push(Risk {
            risk_type: "Critical Component Impact".to_string(),
            level: RiskLevel::High,
            description: format!("{critical} critical components affected"),
            probability: 0.8,
        });
        mitigation_strategies.insert(
            "Critical Component Impact".to_string(),
            "Implement feature flags and gradual rollout".to_string(),
        );
    }

    if change_type == ChangeType::Security {
        risks.push(Risk {
            risk_type: "Security Change".to_string(),
            level: RiskLevel::Moderate,
            description: "Security-related changes require thorough testing".to_string(),
            probability: 0.6,
        });
        mitigation_strategies.insert(
            "Security Change".to_string(),
            "Conduct security review and penetration testing".to_string(),
        );
    }

    let overall_risk = risks
        .iter()
        .map(|r| r.level)
        .max()
        .unwrap_or(RiskLevel::Minimal);

    RiskAssessment {
        overall_risk,
        identified_risks: risks,
        mitigation_strategies,
    }
}

fn recommend(affected_count: usize, overall_risk: RiskLevel) -> Vec<String> {
    let mut recommendations = Vec::new();

    if overall_risk >= RiskLevel::High {
        recommendations
            .push("Consider breaking down the change into smaller, incremental updates".to_string());
        recommendations
            .push("Implement comprehensive testing strategy including integration tests".to_string());
    }

    if affected_count > PHASED_ROLLOUT_THRESHOLD {
        recommendations
            .push("Large number of components affected - consider phased rollout".to_string());
    }

    recommendations.push("Update documentation for all affected components".to_string());
    recommendations.push("Notify stakeholders of impacted services".to_string());

    recommendations
}

fn estimate_effort(affected: &[AffectedComponent]) -> EffortEstimate {
    let effort_by_component: BTreeMap<ComponentId, u32> = affected
        .iter()
        .map(|c| (c.component_id.clone(), c.impact_level.effort_hours()))
        .collect();
    let estimated_hours = effort_by_component.values().sum::<u32>();

    EffortEstimate {
        estimated_hours,
        developer_count: (estimated_hours / HOURS_PER_DEVELOPER).clamp(1, MAX_DEVELOPERS),
        effort_by_component,
    }
}

fn analysis_event(analysis: &ImpactAnalysis) -> AnalysisEvent {
    let mut results = serde_json::Map::new();
    results.insert(
        "totalAffected".to_string(),
        analysis.impact_summary.total_components_affected.into(),
    );
    results.insert(
        "overallRisk".to_string(),
        analysis.risk_assessment.overall_risk.to_string().into(),
    );

    AnalysisEvent {
        event_id: analysis.analysis_id.clone(),
        project_id: analysis.project_id.clone(),
        analysis_type: AnalysisType::ChangeImpact,
        trigger_source: "ripple".to_string(),
        affected_components: analysis
            .affected_components
            .iter()
            .map(|c| c.component_id.clone())
            .collect(),
        analysis_results: results,
        recommendations: analysis.recommendations.clone(),
        timestamp: Utc::now(),
    }
}
