//! Scenario 4: Revision budget exhausted (degraded)
//!
//! The question falls outside the indexed corpus. Research finds no
//! sources, so every round fails grounding and confidence, and each
//! revision returns the same thin findings. The run stops at the revision
//! ceiling and reports a degraded answer.

use tracing::info;

use regula_contracts::{
    error::RegulaResult,
    request::{AnalysisRequest, Priority},
};

use super::{scenario_config, ScenarioReport};
use crate::runtime::Runtime;

pub const NAME: &str = "revision-budget";

/// Revision ceiling for this scenario.
pub const MAX_REVISIONS: u32 = 2;

pub fn request() -> AnalysisRequest {
    AnalysisRequest::new(
        "Which rules govern lunar regolith souvenirs sold at museum gift shops?",
        Priority::Medium,
    )
}

pub async fn run_scenario() -> RegulaResult<ScenarioReport> {
    let mut config = scenario_config();
    config.max_revisions = MAX_REVISIONS;
    let runtime = Runtime::offline(config)?;

    let output = runtime.analyze(request()).await?;
    info!(scenario = NAME, status = %output.status, revisions = output.revision_count, "scenario complete");
    Ok(ScenarioReport::new(NAME, &runtime, output))
}

#[cfg(test)]
mod tests {
    use regula_contracts::{execution::Node, state::RunStatus};

    use super::*;

    #[tokio::test]
    async fn run_stops_at_the_revision_ceiling() {
        let report = run_scenario().await.unwrap();
        let out = &report.output;

        assert_eq!(out.status, RunStatus::Degraded);
        assert_eq!(out.revision_count, MAX_REVISIONS);
        assert!(out.citations.is_empty());
        assert_eq!(
            out.error.as_deref(),
            Some("revision budget of 2 exhausted")
        );

        let gate_passes = out.trace.iter().filter(|e| e.node == Node::QualityCheck).count();
        assert_eq!(gate_passes, MAX_REVISIONS as usize + 1);
        // Revisions cost confidence.
        assert!(out.confidence_score <= 0.9 + 1e-9);
        assert!(report.ledger_verified);
    }
}
