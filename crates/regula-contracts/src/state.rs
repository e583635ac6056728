//! The shared analysis state threaded through one orchestration run.
//!
//! Fields are private so the invariants hold by construction:
//!
//! - `findings` and `trace` are append-only and stamped with one logical
//!   sequence, so insertion order is causal order.
//! - `revision_count` can never pass the ceiling it is incremented against.
//! - `status` only moves from `in_progress` to a terminal value, once.
//! - a finding can only be appended for an agent already present in the
//!   trace.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    agent::{AgentId, AgentView},
    error::{RegulaError, RegulaResult},
    execution::{Node, TraceEntry, TraceOutcome},
    finding::{clamp_unit, dedup_citations, Finding},
    request::{AnalysisRequest, Priority},
};

/// Unique identifier for a single orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Accepted,
    Failed,
    Degraded,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::InProgress => "in_progress",
            RunStatus::Accepted => "accepted",
            RunStatus::Failed => "failed",
            RunStatus::Degraded => "degraded",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an agent left a hole in the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GapReason {
    PermanentFailure { message: String },
    RetriesExhausted { message: String },
    /// A dependency never produced a finding.
    Blocked { dependency: AgentId },
    /// Discarded by the run deadline or cancellation.
    Aborted { message: String },
}

impl GapReason {
    /// A permanent failure cannot be repaired by a revision.
    pub fn is_permanent(&self) -> bool {
        matches!(self, GapReason::PermanentFailure { .. })
    }
}

impl fmt::Display for GapReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapReason::PermanentFailure { message } => write!(f, "permanent failure: {message}"),
            GapReason::RetriesExhausted { message } => write!(f, "retries exhausted: {message}"),
            GapReason::Blocked { dependency } => write!(f, "blocked on {dependency}"),
            GapReason::Aborted { message } => write!(f, "aborted: {message}"),
        }
    }
}

/// A required agent whose last dispatch did not contribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub agent: AgentId,
    pub reason: GapReason,
    /// A failed revision: the agent's finding from an earlier round still
    /// stands in the summary and confidences.
    #[serde(default)]
    pub earlier_finding_kept: bool,
}

impl fmt::Display for CoverageGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.agent, self.reason)?;
        if self.earlier_finding_kept {
            f.write_str(" (revision failed, earlier finding kept)")?;
        }
        Ok(())
    }
}

/// Why a run reached a terminal status other than `accepted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminalCause {
    RevisionBudgetExhausted { max_revisions: u32 },
    RunDeadlineExceeded,
    UnrepairableGaps,
    StructuralContradiction { description: String },
    Cancelled,
}

impl fmt::Display for TerminalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalCause::RevisionBudgetExhausted { max_revisions } => {
                write!(f, "revision budget of {max_revisions} exhausted")
            }
            TerminalCause::RunDeadlineExceeded => f.write_str("run deadline exceeded"),
            TerminalCause::UnrepairableGaps => f.write_str("required agents could not contribute"),
            TerminalCause::StructuralContradiction { description } => {
                write!(f, "structural contradiction: {description}")
            }
            TerminalCause::Cancelled => f.write_str("run cancelled"),
        }
    }
}

/// The single mutable record threaded through the orchestration graph.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisState {
    run_id: RunId,
    query: String,
    context: Option<serde_json::Value>,
    priority: Priority,
    findings: Vec<Finding>,
    revision_count: u32,
    status: RunStatus,
    trace: Vec<TraceEntry>,
    cause: Option<TerminalCause>,
    next_seq: u64,
}

impl AnalysisState {
    /// Create the state for a new run. The request should already be
    /// validated.
    pub fn new(request: &AnalysisRequest) -> Self {
        Self {
            run_id: RunId::new(),
            query: request.query.clone(),
            context: request.context.clone(),
            priority: request.priority,
            findings: Vec::new(),
            revision_count: 0,
            status: RunStatus::InProgress,
            trace: Vec::new(),
            cause: None,
            next_seq: 0,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn context(&self) -> Option<&serde_json::Value> {
        self.context.as_ref()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn revision_count(&self) -> u32 {
        self.revision_count
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn cause(&self) -> Option<&TerminalCause> {
        self.cause.as_ref()
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Append a trace entry for a node entered at `entered_at`.
    pub fn record(
        &mut self,
        node: Node,
        entered_at: DateTime<Utc>,
        outcome: TraceOutcome,
        reason: impl Into<String>,
    ) -> &TraceEntry {
        let seq = self.take_seq();
        self.trace.push(TraceEntry {
            seq,
            node,
            timestamp: entered_at,
            outcome,
            reason: reason.into(),
        });
        &self.trace[self.trace.len() - 1]
    }

    /// Append a finding, stamping its logical sequence number.
    ///
    /// Confidence is clamped to [0, 1] and citations are made unique by id,
    /// however the finding was built.
    ///
    /// Rejected unless the trace already shows the producing agent was
    /// dispatched, or when the run is already terminal.
    pub fn append_finding(&mut self, mut finding: Finding) -> RegulaResult<&Finding> {
        if self.status.is_terminal() {
            return Err(RegulaError::StateMachine {
                reason: format!(
                    "cannot append a {} finding to a {} run",
                    finding.agent_id, self.status
                ),
            });
        }
        let invoked = self
            .trace
            .iter()
            .any(|e| e.node == Node::Agent(finding.agent_id));
        if !invoked {
            return Err(RegulaError::StateMachine {
                reason: format!("{} has no dispatch in the trace", finding.agent_id),
            });
        }
        finding.confidence = clamp_unit(finding.confidence);
        finding.citations = dedup_citations(std::mem::take(&mut finding.citations));
        finding.created_at = self.take_seq();
        self.findings.push(finding);
        Ok(&self.findings[self.findings.len() - 1])
    }

    /// Count one quality-control rejection against `max_revisions`.
    ///
    /// Returns `false` without touching the counter when the ceiling is
    /// already reached.
    pub fn increment_revision(&mut self, max_revisions: u32) -> bool {
        if self.revision_count >= max_revisions {
            return false;
        }
        self.revision_count += 1;
        true
    }

    /// Move the run to a terminal status. Terminal statuses never change.
    pub fn conclude(&mut self, status: RunStatus, cause: Option<TerminalCause>) -> RegulaResult<()> {
        if !status.is_terminal() {
            return Err(RegulaError::StateMachine {
                reason: "a run can only conclude with a terminal status".to_string(),
            });
        }
        if self.status.is_terminal() {
            return Err(RegulaError::StateMachine {
                reason: format!("run already concluded as {}, refusing {}", self.status, status),
            });
        }
        self.status = status;
        self.cause = cause;
        Ok(())
    }

    /// True when `agent` has at least one finding.
    pub fn has_contributed(&self, agent: AgentId) -> bool {
        self.findings.iter().any(|f| f.agent_id == agent)
    }

    /// The most recent finding of each agent. Later findings supersede
    /// earlier ones for quality decisions; `findings` itself is untouched.
    pub fn latest_findings(&self) -> BTreeMap<AgentId, &Finding> {
        let mut latest = BTreeMap::new();
        for finding in &self.findings {
            latest.insert(finding.agent_id, finding);
        }
        latest
    }

    /// Project the read-only view `agent` is allowed to see.
    pub fn view_for(&self, agent: AgentId, revision_hints: Vec<String>, deadline: Instant) -> AgentView {
        let prior_findings = if agent.reads_prior_findings() {
            self.findings.clone()
        } else {
            Vec::new()
        };
        AgentView {
            run_id: self.run_id.clone(),
            agent,
            query: self.query.clone(),
            context: self.context.clone(),
            priority: self.priority,
            prior_findings,
            revision: self.revision_count,
            revision_hints,
            deadline,
        }
    }
}
