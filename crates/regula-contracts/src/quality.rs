//! Quality-control inputs and verdicts.
//!
//! The gate reads an `AnalysisState` plus the run's coverage gaps and
//! returns a `QualityReport`. Its verdict is the only thing that drives the
//! orchestrator out of `QUALITY_CHECK`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    agent::AgentId,
    finding::Finding,
    state::{AnalysisState, CoverageGap, GapReason},
};

/// The individual checks a gate runs, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCheck {
    Coverage,
    Grounding,
    Structure,
    Consistency,
    Confidence,
}

impl fmt::Display for QualityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityCheck::Coverage => "coverage",
            QualityCheck::Grounding => "grounding",
            QualityCheck::Structure => "structure",
            QualityCheck::Consistency => "consistency",
            QualityCheck::Confidence => "confidence",
        };
        f.write_str(s)
    }
}

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityFailure {
    pub check: QualityCheck,
    /// The agent a revision should target. `None` when no single agent can
    /// repair the failure.
    pub agent: Option<AgentId>,
    pub message: String,
    /// False when re-invoking the agent cannot fix it.
    pub repairable: bool,
}

/// The gate's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum QualityVerdict {
    Accept,
    /// Loop back and re-invoke `targets` (priority order, no duplicates).
    Revise { targets: Vec<AgentId> },
    /// Nothing repairable is left but the analysis is incomplete.
    Degrade { gaps: Vec<CoverageGap> },
    /// A structural contradiction no agent can resolve.
    Fail { contradiction: String },
}

impl QualityVerdict {
    pub fn label(&self) -> &'static str {
        match self {
            QualityVerdict::Accept => "accept",
            QualityVerdict::Revise { .. } => "revise",
            QualityVerdict::Degrade { .. } => "degrade",
            QualityVerdict::Fail { .. } => "fail",
        }
    }
}

/// Everything the gate returns for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub verdict: QualityVerdict,
    /// All failures collected, in check order. Empty on accept.
    pub failures: Vec<QualityFailure>,
    /// Weighted mean of latest-finding confidences.
    pub aggregate_confidence: f64,
}

impl QualityReport {
    /// Failure messages addressed to `agent`, used as revision hints.
    pub fn hints_for(&self, agent: AgentId) -> Vec<String> {
        self.failures
            .iter()
            .filter(|f| f.agent == Some(agent))
            .map(|f| format!("{}: {}", f.check, f.message))
            .collect()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|f| format!("{}: {}", f.check, f.message))
            .collect()
    }
}

/// Per-agent weights for the aggregate confidence mean.
///
/// Spelled out field by field so a TOML table maps onto it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentWeights {
    pub research_coordinator: f64,
    pub research: f64,
    pub compliance: f64,
    pub legal_analysis: f64,
    pub risk_assessment: f64,
    pub document_review: f64,
}

impl Default for AgentWeights {
    fn default() -> Self {
        Self {
            research_coordinator: 1.0,
            research: 1.0,
            compliance: 1.0,
            legal_analysis: 1.0,
            risk_assessment: 1.0,
            document_review: 0.0,
        }
    }
}

impl AgentWeights {
    pub fn weight(&self, agent: AgentId) -> f64 {
        match agent {
            AgentId::ResearchCoordinator => self.research_coordinator,
            AgentId::Research => self.research,
            AgentId::Compliance => self.compliance,
            AgentId::LegalAnalysis => self.legal_analysis,
            AgentId::RiskAssessment => self.risk_assessment,
            AgentId::DocumentReview => self.document_review,
        }
    }
}

/// Thresholds the gate applies, resolved for the request's priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCriteria {
    pub confidence_floor: f64,
    pub weights: AgentWeights,
    /// Minimum total research citations once compliance or legal analysis
    /// has contributed.
    pub min_research_citations: usize,
}

/// Weighted mean of the latest confidences. Zero when nothing carries
/// weight.
pub fn weighted_confidence(latest: &BTreeMap<AgentId, &Finding>, weights: &AgentWeights) -> f64 {
    let (sum, total) = latest.iter().fold((0.0, 0.0), |(sum, total), (agent, f)| {
        let w = weights.weight(*agent).max(0.0);
        (sum + w * f.confidence, total + w)
    });
    if total <= 0.0 {
        0.0
    } else {
        crate::finding::clamp_unit(sum / total)
    }
}

/// What the gate evaluates.
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    pub state: &'a AnalysisState,
    /// The dependency-required agents of this run, in priority order.
    pub required: &'a [AgentId],
    /// Agents that settled without contributing.
    pub gaps: &'a [CoverageGap],
    pub criteria: &'a QualityCriteria,
}

impl GateInput<'_> {
    /// True when `agent` is required and neither it nor a dependency it is
    /// blocked on has permanently failed.
    pub fn can_revise(&self, agent: AgentId) -> bool {
        if !self.required.contains(&agent) {
            return false;
        }
        let mut current = agent;
        // Blocked chains are at most as long as the agent set.
        for _ in 0..AgentId::ALL.len() {
            let gap = self.gaps.iter().rev().find(|g| g.agent == current);
            match gap.map(|g| &g.reason) {
                Some(reason) if reason.is_permanent() => return false,
                Some(GapReason::Blocked { dependency }) => current = *dependency,
                _ => return true,
            }
        }
        true
    }
}
