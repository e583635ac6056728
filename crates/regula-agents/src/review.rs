//! Document review: renders the accepted findings as one markdown report.
//!
//! The reviewer asserts nothing of its own. Every line of the report comes
//! from a finding already on record, so it needs no capability backend.

use std::fmt::Write as _;

use async_trait::async_trait;
use tracing::debug;

use regula_contracts::{
    agent::{AgentId, AgentView},
    error::AgentError,
    finding::{dedup_citations, Finding, FindingContent},
};
use regula_core::traits::Agent;

#[derive(Debug, Default)]
pub struct DocumentReviewAgent;

impl DocumentReviewAgent {
    pub fn new() -> Self {
        Self
    }
}

fn section(out: &mut String, finding: &Finding) {
    let _ = writeln!(out, "## {} (confidence {:.2})\n", finding.agent_id, finding.confidence);
    let _ = writeln!(out, "{}\n", finding.summary().trim());
    match &finding.content {
        FindingContent::Research { topics, regulatory_bodies, .. } => {
            if !regulatory_bodies.is_empty() {
                let _ = writeln!(out, "- Authorities: {}", regulatory_bodies.join(", "));
            }
            if !topics.is_empty() {
                let _ = writeln!(out, "- Topics: {}", topics.join(", "));
            }
        }
        FindingContent::Compliance { verdict, requirements, .. } => {
            let _ = writeln!(out, "- Verdict: {}", verdict.as_str());
            for r in requirements {
                let _ = writeln!(out, "- Requirement: {r}");
            }
        }
        FindingContent::LegalAnalysis { verdict, frameworks, .. } => {
            let _ = writeln!(out, "- Verdict: {}", verdict.as_str());
            if !frameworks.is_empty() {
                let _ = writeln!(out, "- Frameworks: {}", frameworks.join(", "));
            }
        }
        FindingContent::RiskAssessment { rating, risks, reconciliation, .. } => {
            let _ = writeln!(out, "- Rating: {}", rating.as_str());
            for r in risks {
                let _ = writeln!(out, "- {} [{}]: {}x{}={}", r.name, r.category, r.probability, r.impact, r.score());
            }
            if let Some(text) = reconciliation {
                let _ = writeln!(out, "- Reconciliation: {text}");
            }
        }
        FindingContent::DocumentReview { .. } => {}
    }
    out.push('\n');
}

#[async_trait]
impl Agent for DocumentReviewAgent {
    fn id(&self) -> AgentId {
        AgentId::DocumentReview
    }

    async fn invoke(&self, view: AgentView) -> Result<Finding, AgentError> {
        // Latest finding per contributing agent, in priority order.
        let latest: Vec<&Finding> = AgentId::ALL
            .iter()
            .filter(|id| id.asserts_facts())
            .filter_map(|id| view.latest_from(*id))
            .collect();
        if latest.is_empty() {
            return Err(AgentError::permanent("no findings to review"));
        }

        let mut report = format!("# Regulatory analysis\n\n> {}\n\n", view.query.trim());
        for finding in &latest {
            section(&mut report, finding);
        }
        let citations = dedup_citations(latest.iter().flat_map(|f| f.citations.iter().cloned()));
        if !citations.is_empty() {
            report.push_str("## Sources\n\n");
            for c in &citations {
                let label = c.title.as_deref().unwrap_or(&c.id);
                let _ = writeln!(report, "- [{label}]({})", c.url);
            }
        }

        let confidence = latest.iter().map(|f| f.confidence).sum::<f64>() / latest.len() as f64;
        debug!(run_id = %view.run_id, sections = latest.len(), citations = citations.len(), "report rendered");

        Ok(Finding::new(
            AgentId::DocumentReview,
            FindingContent::DocumentReview {
                summary: format!(
                    "Report merges {} findings and {} sources",
                    latest.len(),
                    citations.len()
                ),
                report,
            },
            citations,
            confidence,
        ))
    }
}
