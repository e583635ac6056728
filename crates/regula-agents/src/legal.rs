//! Legal analysis: identifies the governing frameworks and takes a legal
//! position on the query.

use std::collections::BTreeSet;
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
    capability::{ReasoningProvider, ReasoningRequest, ReasoningTask},
    compliance::{prior_evidence, UNGROUNDED_CEILING},
    extract::QueryFeatures,
};

pub struct LegalAnalysisAgent {
    reasoning: Arc<dyn ReasoningProvider>,
}

impl LegalAnalysisAgent {
    pub fn new(reasoning: Arc<dyn ReasoningProvider>) -> Self {
        Self { reasoning }
    }
}

#[async_trait]
impl Agent for LegalAnalysisAgent {
    fn id(&self) -> AgentId {
        AgentId::LegalAnalysis
    }

    async fn invoke(&self, view: AgentView) -> Result<Finding, AgentError> {
        let context = view.context_text();
        let features = QueryFeatures::extract(&view.query, context.as_deref());

        let answer = self
            .reasoning
            .reason(&ReasoningRequest {
                task: ReasoningTask::AnalyzeLegal,
                query: view.query.clone(),
                context,
                evidence: prior_evidence(&view),
                hints: view.revision_hints.clone(),
                deadline: view.deadline,
            })
            .await?;
        let summary = answer.text.trim();
        if summary.is_empty() {
            return Err(AgentError::permanent("reasoning returned an empty legal analysis"));
        }

        // Frameworks named in the query first, then whatever the analysis adds.
        let mut seen = BTreeSet::new();
        let frameworks: Vec<String> = features
            .frameworks
            .into_iter()
            .chain(answer.items)
            .filter(|f| seen.insert(f.to_lowercase()))
            .collect();

        let citations: Vec<Citation> = view.research_citations().cloned().collect();
        let confidence = if citations.is_empty() {
            answer.confidence.min(UNGROUNDED_CEILING)
        } else {
            answer.confidence
        };
        let verdict = answer.verdict.unwrap_or(ComplianceVerdict::Undetermined);
        debug!(
            run_id = %view.run_id,
            verdict = verdict.as_str(),
            frameworks = frameworks.len(),
            "legal analysis complete"
        );

        Ok(Finding::new(
            AgentId::LegalAnalysis,
            FindingContent::LegalAnalysis {
                summary: summary.to_string(),
                verdict,
                frameworks,
            },
            citations,
            confidence,
        ))
    }
}
