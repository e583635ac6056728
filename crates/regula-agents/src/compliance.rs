//! Compliance assessment: decides whether the subject of the query meets
//! the applicable requirements, grounded in research citations.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use regula_contracts::{
    agent::{AgentId, AgentView},
    error::AgentError,
    finding::{Citation, ComplianceVerdict, Finding, FindingContent},
};
use regula_core::traits::Agent;

use crate::{
    capability::{ReasoningProvider, ReasoningRequest, ReasoningTask, SearchHit, SearchProvider, SearchQuery},
    extract::{QueryFeatures, ResearchStrategy},
};

/// Confidence ceiling for a verdict reached without any sources.
pub(crate) const UNGROUNDED_CEILING: f64 = 0.5;

/// Evidence lines for the reasoning backend: prior research summaries
/// first, then every citation excerpt.
pub(crate) fn prior_evidence(view: &AgentView) -> Vec<String> {
    view.prior_findings
        .iter()
        .filter(|f| f.agent_id.is_research_class())
        .map(|f| format!("{}: {}", f.agent_id, f.summary()))
        .chain(view.research_citations().map(|c| format!("[{}] {}", c.id, c.excerpt)))
        .collect()
}

pub struct ComplianceAgent {
    search: Arc<dyn SearchProvider>,
    reasoning: Arc<dyn ReasoningProvider>,
    max_results: usize,
}

impl ComplianceAgent {
    pub fn new(search: Arc<dyn SearchProvider>, reasoning: Arc<dyn ReasoningProvider>) -> Self {
        Self {
            search,
            reasoning,
            max_results: 3,
        }
    }
}

#[async_trait]
impl Agent for ComplianceAgent {
    fn id(&self) -> AgentId {
        AgentId::Compliance
    }

    async fn invoke(&self, view: AgentView) -> Result<Finding, AgentError> {
        let context = view.context_text();
        let features = QueryFeatures::extract(&view.query, context.as_deref());

        let hits = self
            .search
            .search(&SearchQuery {
                text: format!("compliance requirements {}", view.query),
                bodies: features.bodies.clone(),
                strategy: ResearchStrategy::ComplianceAnalysis,
                max_results: self.max_results,
                deadline: view.deadline,
            })
            .await?;

        let mut evidence = prior_evidence(&view);
        evidence.extend(hits.iter().map(|h| format!("[{}] {}", h.id, h.excerpt)));

        let answer = self
            .reasoning
            .reason(&ReasoningRequest {
                task: ReasoningTask::AssessCompliance,
                query: view.query.clone(),
                context,
                evidence,
                hints: view.revision_hints.clone(),
                deadline: view.deadline,
            })
            .await?;
        let summary = answer.text.trim();
        if summary.is_empty() {
            return Err(AgentError::permanent("reasoning returned an empty compliance assessment"));
        }

        let citations: Vec<Citation> = view
            .research_citations()
            .cloned()
            .chain(hits.iter().map(SearchHit::citation))
            .collect();
        let confidence = if citations.is_empty() {
            answer.confidence.min(UNGROUNDED_CEILING)
        } else {
            answer.confidence
        };
        let verdict = answer.verdict.unwrap_or(ComplianceVerdict::Undetermined);
        debug!(
            run_id = %view.run_id,
            verdict = verdict.as_str(),
            requirements = answer.items.len(),
            citations = citations.len(),
            "compliance assessed"
        );

        Ok(Finding::new(
            AgentId::Compliance,
            FindingContent::Compliance {
                summary: summary.to_string(),
                verdict,
                requirements: answer.items,
            },
            citations,
            confidence,
        ))
    }
}
