//! Scenario 3: Contradictory verdicts reconciled through a revision
//!
//! Legal analysis first returns a weak answer that agrees with compliance.
//! The gate sends legal analysis and the risk assessment built on it back
//! for revision. The revised legal analysis now contradicts compliance, and
//! the revised risk assessment, which runs after it, reconciles the two
//! positions. The gate accepts on the second pass.

use std::sync::Arc;

use tracing::info;

use regula_agents::capability::{Reasoning, ReasoningTask};
use regula_contracts::{
    error::RegulaResult,
    finding::ComplianceVerdict,
    request::{AnalysisRequest, Priority},
};

use super::{scenario_config, ScenarioReport};
use crate::{
    faults::ScriptedReasoning,
    providers::{CorpusReasoning, CorpusSearch},
    runtime::Runtime,
};

pub const NAME: &str = "contradiction";

pub fn request() -> AnalysisRequest {
    AnalysisRequest::new(
        "Is an imported class II infusion pump device compliant with ANVISA rules?",
        Priority::High,
    )
}

fn scripted() -> ScriptedReasoning {
    ScriptedReasoning::new(Arc::new(CorpusReasoning))
        .then(
            ReasoningTask::AssessCompliance,
            Reasoning {
                text: "Compliant: the pump holds a valid notification under RDC 751/2022".to_string(),
                verdict: Some(ComplianceVerdict::Compliant),
                items: vec!["notification under RDC 751/2022".to_string()],
                confidence: 0.85,
            },
        )
        .then(
            ReasoningTask::AnalyzeLegal,
            Reasoning {
                text: "Probably compliant, sources are thin".to_string(),
                verdict: Some(ComplianceVerdict::Compliant),
                items: vec![],
                confidence: 0.1,
            },
        )
        .then(
            ReasoningTask::AnalyzeLegal,
            Reasoning {
                text: "Non-compliant: Lei 6.360/1976 requires the importer to hold its own authorization"
                    .to_string(),
                verdict: Some(ComplianceVerdict::NonCompliant),
                items: vec!["Lei 6.360/1976".to_string()],
                confidence: 0.85,
            },
        )
}

pub async fn run_scenario() -> RegulaResult<ScenarioReport> {
    let runtime = Runtime::new(scenario_config(), Arc::new(CorpusSearch), Arc::new(scripted()))?;

    let output = runtime.analyze(request()).await?;
    info!(scenario = NAME, status = %output.status, revisions = output.revision_count, "scenario complete");
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
    async fn contradiction_is_reconciled_by_the_revised_risk_assessment() {
        let report = run_scenario().await.unwrap();
        let out = &report.output;

        assert_eq!(out.status, RunStatus::Accepted);
        assert_eq!(out.revision_count, 1);
        assert!(out.summary.contains("Non-compliant"));

        let revise = out
            .trace
            .iter()
            .find_map(|e| match &e.outcome {
                TraceOutcome::Revise { targets, .. } => Some(targets.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(revise, vec![AgentId::LegalAnalysis, AgentId::RiskAssessment]);

        // The revised legal analysis settles before the revised risk assessment.
        let revised: Vec<AgentId> = out
            .trace
            .iter()
            .skip_while(|e| e.node != Node::QualityCheck)
            .filter_map(|e| match e.node {
                Node::Agent(agent) => Some(agent),
                _ => None,
            })
            .collect();
        assert_eq!(
            revised,
            vec![AgentId::LegalAnalysis, AgentId::RiskAssessment, AgentId::DocumentReview]
        );

        let risk = out.agent_confidences[&AgentId::RiskAssessment];
        assert!((risk - 0.8).abs() < 1e-9);
        assert!(report.ledger_verified);
    }
}
