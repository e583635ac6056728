//! Scenario 1: Device registration (accepted)
//!
//! A critical-priority question about registering a class II infusion pump.
//! The search backend drops its first two general queries, so the research
//! agents recover through local retries. Every agent then contributes,
//! compliance and legal analysis agree, and the gate accepts on the first
//! pass.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use regula_agents::extract::ResearchStrategy;
use regula_contracts::{
    error::RegulaResult,
    request::{AnalysisRequest, Priority},
};

use super::{scenario_config, ScenarioReport};
use crate::{
    faults::{Fault, FaultySearch},
    providers::{CorpusReasoning, CorpusSearch},
    runtime::Runtime,
};

pub const NAME: &str = "device-registration";

pub fn request() -> AnalysisRequest {
    AnalysisRequest::new(
        "Registration requirements for a class II infusion pump (medical device) with ANVISA under RDC 751/2022",
        Priority::Critical,
    )
    .with_context(json!({
        "manufacturer_country": "DE",
        "intended_use": "hospital infusion therapy",
    }))
}

pub async fn run_scenario() -> RegulaResult<ScenarioReport> {
    let search = FaultySearch::new(Arc::new(CorpusSearch), Fault::Transient { failures: 2 })
        .only(ResearchStrategy::General);
    let runtime = Runtime::new(scenario_config(), Arc::new(search), Arc::new(CorpusReasoning))?;

    let output = runtime.analyze(request()).await?;
    info!(scenario = NAME, status = %output.status, confidence = output.confidence_score, "scenario complete");
    Ok(ScenarioReport::new(NAME, &runtime, output))
}

#[cfg(test)]
mod tests {
    use regula_contracts::{
        agent::AgentId,
        execution::{Node, TraceOutcome},
        state::RunStatus,
    };

    use super::*;

    #[tokio::test]
    async fn registration_is_accepted_after_retries() {
        let report = run_scenario().await.unwrap();
        let out = &report.output;

        assert_eq!(out.status, RunStatus::Accepted);
        assert!(!out.partial);
        assert_eq!(out.revision_count, 0);
        assert!(out.gaps.is_empty());
        assert!(out.confidence_score >= 0.8, "confidence {}", out.confidence_score);
        assert_eq!(out.citations[0].id, "rdc-751-2022");
        assert!(out.summary.starts_with("[research_coordinator]"));

        let retried: u32 = out
            .trace
            .iter()
            .filter(|e| matches!(e.node, Node::Agent(_)))
            .filter_map(|e| match e.outcome {
                TraceOutcome::Contributed { attempts, .. } => Some(attempts - 1),
                _ => None,
            })
            .sum();
        assert_eq!(retried, 2, "two dropped searches, two retries");

        assert!(out
            .trace
            .iter()
            .any(|e| e.node == Node::Agent(AgentId::DocumentReview)));
        assert!(report.ledger_verified);
        assert_eq!(report.sealed_runs, 1);
    }
}
