//! Reference scenarios.
//!
//! Each scenario wires the offline corpus providers, optionally wrapped in
//! fault injectors, into a full runtime and runs one analysis request
//! through it.

use serde::Serialize;

use regula_config::OrchestratorConfig;
use regula_contracts::{error::RegulaResult, request::AnalysisOutput};

use crate::runtime::Runtime;

pub mod compliance_outage;
pub mod contradiction;
pub mod device_registration;
pub mod revision_budget;

/// What a scenario produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub output: AnalysisOutput,
    /// Whether the ledger's hash chain still verifies after the run.
    pub ledger_verified: bool,
    pub sealed_runs: usize,
}

impl ScenarioReport {
    pub(crate) fn new(name: &'static str, runtime: &Runtime, output: AnalysisOutput) -> Self {
        Self {
            name,
            output,
            ledger_verified: runtime.ledger.verify_integrity(),
            sealed_runs: runtime.ledger.len(),
        }
    }
}

/// Stock configuration with short backoffs, so outages play out quickly.
pub fn scenario_config() -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();
    config.retry.initial_backoff_ms = 20;
    config.retry.max_backoff_ms = 100;
    config
}

/// Run every scenario in order.
pub async fn run_all() -> RegulaResult<Vec<ScenarioReport>> {
    Ok(vec![
        device_registration::run_scenario().await?,
        compliance_outage::run_scenario().await?,
        contradiction::run_scenario().await?,
        revision_budget::run_scenario().await?,
    ])
}
