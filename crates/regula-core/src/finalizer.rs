//! Deterministic merge of a concluded run into its output record.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::info;

use regula_config::OrchestratorConfig;
use regula_contracts::{
    execution::{Node, TraceOutcome},
    finding::{clamp_unit, dedup_citations},
    quality::{weighted_confidence, AgentWeights},
    request::AnalysisOutput,
    state::{AnalysisState, CoverageGap, RunStatus},
};

/// Merges findings into the final answer. Never fails.
#[derive(Debug, Clone)]
pub struct Finalizer {
    weights: AgentWeights,
    revision_penalty: f64,
}

impl Finalizer {
    pub fn new(weights: AgentWeights, revision_penalty: f64) -> Self {
        Self {
            weights,
            revision_penalty,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.weights.clone(), config.revision_penalty)
    }

    /// Confidence ceiling after `revisions` loop-backs.
    pub fn revision_ceiling(&self, revisions: u32) -> f64 {
        clamp_unit(1.0 - self.revision_penalty * f64::from(revisions))
    }

    /// Build the output for `state` and append the `Finalize` trace entry.
    ///
    /// - summaries are taken from each agent's latest finding, in priority
    ///   order, so concurrent completion order never shows in the text
    /// - citations come from every finding in insertion order, unique by id
    /// - a `failed` run withholds the summary and reports its cause instead
    /// - anything other than `accepted` is flagged partial
    pub fn finalize(&self, state: &mut AnalysisState, gaps: Vec<CoverageGap>) -> AnalysisOutput {
        let entered_at = Utc::now();
        let status = state.status();
        let latest = state.latest_findings();

        let agent_confidences: BTreeMap<_, _> =
            latest.iter().map(|(agent, f)| (*agent, f.confidence)).collect();

        let (summary, confidence_score) = if status == RunStatus::Failed {
            (String::new(), 0.0)
        } else {
            let summary = latest
                .iter()
                .filter(|(_, f)| !f.summary().trim().is_empty())
                .map(|(agent, f)| format!("[{}] {}", agent, f.summary().trim()))
                .collect::<Vec<_>>()
                .join("\n\n");
            let mean = weighted_confidence(&latest, &self.weights);
            let score = clamp_unit(mean.min(self.revision_ceiling(state.revision_count())));
            (summary, score)
        };

        let citations = dedup_citations(
            state
                .findings()
                .iter()
                .flat_map(|f| f.citations.iter().cloned()),
        );

        let partial = status != RunStatus::Accepted;
        let error = match status {
            RunStatus::Accepted => None,
            RunStatus::InProgress => Some("run finalized before reaching a terminal status".to_string()),
            _ => state.cause().map(|c| c.to_string()),
        };

        state.record(
            Node::Finalize,
            entered_at,
            TraceOutcome::Finalized {
                confidence_score,
                partial,
            },
            format!("finalize {status} run"),
        );

        info!(
            run_id = %state.run_id(),
            status = %status,
            confidence_score,
            citations = citations.len(),
            revisions = state.revision_count(),
            "run finalized"
        );

        AnalysisOutput {
            run_id: state.run_id().clone(),
            summary,
            confidence_score,
            citations,
            status,
            partial,
            revision_count: state.revision_count(),
            gaps: if status == RunStatus::Accepted { Vec::new() } else { gaps },
            error,
            agent_confidences,
            trace: state.trace().to_vec(),
        }
    }
}
