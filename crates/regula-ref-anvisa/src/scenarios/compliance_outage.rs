//! Scenario 2: Compliance outage (degraded)
//!
//! The reasoning backend is down for compliance assessments and never
//! recovers. Compliance exhausts its retries in the first round, the gate
//! asks for one revision, compliance fails again, and the run ends degraded
//! with the research and legal findings it did gather.

use std::sync::Arc;

use tracing::info;

use regula_agents::capability::ReasoningTask;
use regula_contracts::{
    error::RegulaResult,
    request::{AnalysisRequest, Priority},
};

use super::{scenario_config, ScenarioReport};
use crate::{
    faults::{Fault, FaultyReasoning},
    providers::{CorpusReasoning, CorpusSearch},
    runtime::Runtime,
};

pub const NAME: &str = "compliance-outage";

pub fn request() -> AnalysisRequest {
    AnalysisRequest::new(
        "Does a class II glucose monitor device keep its ANVISA notification after a labeling change?",
        Priority::High,
    )
}

pub async fn run_scenario() -> RegulaResult<ScenarioReport> {
    let reasoning =
        FaultyReasoning::new(Arc::new(CorpusReasoning), Fault::outage()).only(ReasoningTask::AssessCompliance);
    let mut config = scenario_config();
    config.max_revisions = 1;
    let runtime = Runtime::new(config, Arc::new(CorpusSearch), Arc::new(reasoning))?;

    let output = runtime.analyze(request()).await?;
    info!(scenario = NAME, status = %output.status, gaps = output.gaps.len(), "scenario complete");
    Ok(ScenarioReport::new(NAME, &runtime, output))
}
