//! Agent identity and the read-only view handed to an agent invocation.
//!
//! The agent set is closed: every specialized agent is one `AgentId`
//! variant, and the orchestrator resolves ids to implementations once at
//! startup. Declaration order of the variants is the fixed priority order
//! used to break ties between independently runnable agents.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::{finding::Finding, request::Priority, state::RunId};

/// Stable identifier for a specialized agent.
///
/// `Ord` follows the declaration order, which is the routing priority:
/// research_coordinator > research > compliance > legal_analysis >
/// risk_assessment > document_review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    /// Reasoning-with-web-access research (Perplexity-class).
    ResearchCoordinator,
    /// Search-backed research producing sourced facts.
    Research,
    Compliance,
    LegalAnalysis,
    RiskAssessment,
    /// Formats and merges accepted findings; asserts no new facts.
    DocumentReview,
}

impl AgentId {
    /// Every agent id in priority order.
    pub const ALL: [AgentId; 6] = [
        AgentId::ResearchCoordinator,
        AgentId::Research,
        AgentId::Compliance,
        AgentId::LegalAnalysis,
        AgentId::RiskAssessment,
        AgentId::DocumentReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::ResearchCoordinator => "research_coordinator",
            AgentId::Research => "research",
            AgentId::Compliance => "compliance",
            AgentId::LegalAnalysis => "legal_analysis",
            AgentId::RiskAssessment => "risk_assessment",
            AgentId::DocumentReview => "document_review",
        }
    }

    /// Research-class agents ground the others with citations.
    pub fn is_research_class(&self) -> bool {
        matches!(self, AgentId::ResearchCoordinator | AgentId::Research)
    }

    /// Everything except document review contributes regulatory facts and
    /// therefore belongs to the dependency-required set.
    pub fn asserts_facts(&self) -> bool {
        !matches!(self, AgentId::DocumentReview)
    }

    /// Research-class agents may read only the query and context; every
    /// downstream agent also reads prior findings.
    pub fn reads_prior_findings(&self) -> bool {
        !self.is_research_class()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The read-only projection of the analysis state an agent receives.
///
/// Views are owned snapshots: an agent can never reach back into the shared
/// state, so concurrent agents need no locking. `prior_findings` is empty
/// for research-class agents.
#[derive(Debug, Clone)]
pub struct AgentView {
    pub run_id: RunId,
    /// The agent this view was projected for.
    pub agent: AgentId,
    pub query: String,
    pub context: Option<serde_json::Value>,
    pub priority: Priority,
    /// Findings recorded before this dispatch, in insertion order.
    pub prior_findings: Vec<Finding>,
    /// Number of quality-control revisions so far in this run.
    pub revision: u32,
    /// Why the quality gate asked for this agent again (empty on first runs).
    pub revision_hints: Vec<String>,
    /// Absolute deadline for this attempt. The orchestrator cancels the
    /// invocation when it passes; agents may use it to bound upstream calls.
    pub deadline: Instant,
}

impl AgentView {
    /// Latest finding recorded by `agent`, if any.
    pub fn latest_from(&self, agent: AgentId) -> Option<&Finding> {
        self.prior_findings.iter().rev().find(|f| f.agent_id == agent)
    }

    /// Citations from all research-class findings visible to this agent.
    pub fn research_citations(&self) -> impl Iterator<Item = &crate::finding::Citation> {
        self.prior_findings
            .iter()
            .filter(|f| f.agent_id.is_research_class())
            .flat_map(|f| f.citations.iter())
    }

    /// The context rendered as plain text, whatever shape the caller sent.
    pub fn context_text(&self) -> Option<String> {
        match &self.context {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}
