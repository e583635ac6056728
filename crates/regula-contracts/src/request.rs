//! The run's boundary records: what comes in, what goes out, and what the
//! observability sink receives.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    agent::AgentId,
    error::{RegulaError, RegulaResult},
    execution::TraceEntry,
    finding::Citation,
    state::{CoverageGap, RunId, RunStatus},
};

/// Urgency of a request. Affects timeout and iteration budgets, never the
/// routing topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An incoming regulatory-analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub query: String,
    /// Free text or a JSON object supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(default)]
    pub priority: Priority,
}

impl AnalysisRequest {
    pub fn new(query: impl Into<String>, priority: Priority) -> Self {
        Self {
            query: query.into(),
            context: None,
            priority,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Reject requests the runtime cannot start a run for.
    pub fn validate(&self) -> RegulaResult<()> {
        if self.query.trim().is_empty() {
            return Err(RegulaError::InvalidRequest {
                reason: "query must not be empty".to_string(),
            });
        }
        match &self.context {
            None
            | Some(serde_json::Value::Null)
            | Some(serde_json::Value::String(_))
            | Some(serde_json::Value::Object(_)) => Ok(()),
            Some(other) => Err(RegulaError::InvalidRequest {
                reason: format!("context must be text or an object, got {other}"),
            }),
        }
    }
}

/// The finalized answer of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub run_id: RunId,
    /// Agent summaries merged in fixed priority order. Empty for `failed`.
    pub summary: String,
    pub confidence_score: f64,
    pub citations: Vec<Citation>,
    pub status: RunStatus,
    /// True whenever the answer did not pass quality control.
    pub partial: bool,
    pub revision_count: u32,
    /// Coverage gaps that left the answer incomplete.
    #[serde(default)]
    pub gaps: Vec<CoverageGap>,
    /// Contradiction or termination cause for failed/degraded runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Latest confidence reported by each contributing agent.
    #[serde(default)]
    pub agent_confidences: BTreeMap<AgentId, f64>,
    pub trace: Vec<TraceEntry>,
}

/// What the observability sink receives, exactly once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub query: String,
    pub priority: Priority,
    pub status: RunStatus,
    pub confidence_score: f64,
    pub revision_count: u32,
    pub gaps: Vec<CoverageGap>,
    pub trace: Vec<TraceEntry>,
}

impl RunReport {
    pub fn new(request: &AnalysisRequest, output: &AnalysisOutput) -> Self {
        Self {
            run_id: output.run_id.clone(),
            query: request.query.clone(),
            priority: request.priority,
            status: output.status,
            confidence_score: output.confidence_score,
            revision_count: output.revision_count,
            gaps: output.gaps.clone(),
            trace: output.trace.clone(),
        }
    }
}
