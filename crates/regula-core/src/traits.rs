//! Core trait definitions for the REGULA orchestration pipeline.
//!
//! Three seams define the boundary of the orchestrator:
//!
//! - `Agent`        : untrusted, fallible, latency-variable analysis logic
//! - `QualityGate`  : trusted, pure evaluation of the accumulated findings
//! - `RunObserver`  : the observability sink, fed once per run
//!
//! The orchestrator owns the analysis state. Agents only ever see an owned
//! `AgentView` snapshot and hand back a new `Finding`.

use async_trait::async_trait;

use regula_contracts::{
    agent::{AgentId, AgentView},
    error::{AgentError, RegulaResult},
    finding::Finding,
    quality::{GateInput, QualityReport},
    request::RunReport,
};

/// A specialized analysis agent.
///
/// Implementations may call LLMs, search backends, or anything else, but
/// they must be stateless across invocations and must never hold on to the
/// view after returning. The orchestrator enforces `view.deadline`: an
/// invocation still running when it passes is dropped and reported as a
/// timeout.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The id this implementation is registered under. A finding attributed
    /// to any other id is rejected as a permanent failure.
    fn id(&self) -> AgentId;

    /// Produce one finding for `view`.
    ///
    /// Return `AgentError::Transient` for failures worth retrying (timeouts,
    /// throttling, upstream outages) and `AgentError::Permanent` for
    /// everything a retry cannot fix.
    async fn invoke(&self, view: AgentView) -> Result<Finding, AgentError>;
}

/// The quality-control gate between agent rounds and finalization.
///
/// Implementations must be deterministic and side-effect free: the same
/// input always produces the same report.
pub trait QualityGate: Send + Sync {
    fn evaluate(&self, input: &GateInput<'_>) -> RegulaResult<QualityReport>;
}

/// Receives the terminal report of every run, exactly once.
///
/// A failing observer is logged and otherwise ignored; it cannot change the
/// answer returned to the caller.
pub trait RunObserver: Send + Sync {
    fn emit(&self, report: &RunReport) -> RegulaResult<()>;
}
