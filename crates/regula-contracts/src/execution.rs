//! Routing decisions and trace records.
//!
//! `RoutingDecision` is what the router returns at every `ROUTING` step.
//! `TraceEntry` is what gets appended to the run's trace, one per node the
//! orchestrator entered. The trace is for observability only; control flow
//! never reads a `reason`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{agent::AgentId, state::{CoverageGap, RunStatus}};

/// A node of the orchestration graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Agent(AgentId),
    QualityCheck,
    Finalize,
}

/// What the router wants to happen next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Next {
    /// Dispatch one agent.
    Agent(AgentId),
    /// Dispatch several agents concurrently and join on all of them.
    /// Listed in priority order.
    Concurrent(Vec<AgentId>),
    QualityCheck,
    Finalize,
    /// End the run with the given terminal status.
    Terminate(RunStatus),
}

impl Next {
    /// Build the dispatch variant for a non-empty, priority-ordered wave.
    pub fn dispatch(mut agents: Vec<AgentId>) -> Option<Next> {
        agents.sort();
        agents.dedup();
        match agents.len() {
            0 => None,
            1 => Some(Next::Agent(agents[0])),
            _ => Some(Next::Concurrent(agents)),
        }
    }

    /// Agents named by this decision, empty for non-dispatch decisions.
    pub fn agents(&self) -> Vec<AgentId> {
        match self {
            Next::Agent(agent) => vec![*agent],
            Next::Concurrent(agents) => agents.clone(),
            _ => Vec::new(),
        }
    }
}

/// Output of the router at each step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub next: Next,
    /// Short rationale for the trace.
    pub reason: String,
}

impl RoutingDecision {
    pub fn new(next: Next, reason: impl Into<String>) -> Self {
        Self {
            next,
            reason: reason.into(),
        }
    }
}

/// The outcome recorded for a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceOutcome {
    /// The agent returned a finding.
    Contributed { confidence: f64, attempts: u32 },
    /// Transient failures exhausted the retry budget.
    RetriesExhausted { attempts: u32, message: String },
    /// The agent reported a permanent failure; never retried.
    PermanentFailure { message: String },
    /// The agent was not dispatched because a dependency is unmet.
    Skipped { dependency: AgentId },
    /// In-flight work discarded by the run deadline or cancellation.
    Aborted { message: String },
    Accepted,
    Revise { targets: Vec<AgentId>, reasons: Vec<String> },
    /// Only unrepairable gaps remain.
    Degrade { gaps: Vec<CoverageGap> },
    Fail { contradiction: String },
    Finalized { confidence_score: f64, partial: bool },
}

impl TraceOutcome {
    pub fn is_revise(&self) -> bool {
        matches!(self, TraceOutcome::Revise { .. })
    }
}

/// One entry in the run's append-only trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Logical sequence shared with finding `created_at` values.
    pub seq: u64,
    pub node: Node,
    /// Wall-clock time the node was entered (UTC).
    pub timestamp: DateTime<Utc>,
    pub outcome: TraceOutcome,
    /// The routing rationale that led to this node.
    pub reason: String,
}
