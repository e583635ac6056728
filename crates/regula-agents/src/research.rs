//! Research-class agents.
//!
//! `ResearchAgent` runs one focused search and synthesizes it.
//! `ResearchCoordinatorAgent` is the web-reasoning variant: it fans a query
//! out over every research strategy the wording calls for and merges the
//! results before synthesis. Both read only the query and its context.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use regula_contracts::{
    agent::{AgentId, AgentView},
    error::AgentError,
    finding::{Finding, FindingContent},
};
use regula_core::traits::Agent;

use crate::{
    capability::{ReasoningProvider, ReasoningRequest, ReasoningTask, SearchHit, SearchProvider, SearchQuery},
    extract::{QueryFeatures, ResearchStrategy},
};

/// Bodies monitored for updates when the query names none.
const DEFAULT_MONITORED_BODIES: [&str; 3] = ["ANVISA", "ANATEL", "LGPD"];

/// Blend synthesis confidence with how relevant the sources were. Without
/// sources the synthesis is worth half.
pub(crate) fn grounded_confidence(reasoning: f64, hits: &[SearchHit]) -> f64 {
    if hits.is_empty() {
        return reasoning * 0.5;
    }
    let relevance = hits.iter().map(|h| h.relevance).sum::<f64>() / hits.len() as f64;
    (reasoning + relevance) / 2.0
}

pub(crate) fn evidence_lines(hits: &[SearchHit]) -> Vec<String> {
    hits.iter().map(|h| format!("[{}] {}", h.id, h.excerpt)).collect()
}

fn wants_more_sources(view: &AgentView) -> bool {
    view.revision_hints.iter().any(|h| h.starts_with("grounding"))
}

async fn synthesize(
    reasoning: &dyn ReasoningProvider,
    view: &AgentView,
    hits: &[SearchHit],
) -> Result<(String, f64), AgentError> {
    let answer = reasoning
        .reason(&ReasoningRequest {
            task: ReasoningTask::Synthesize,
            query: view.query.clone(),
            context: view.context_text(),
            evidence: evidence_lines(hits),
            hints: view.revision_hints.clone(),
            deadline: view.deadline,
        })
        .await?;
    let summary = answer.text.trim();
    if summary.is_empty() {
        return Err(AgentError::permanent("reasoning returned an empty synthesis"));
    }
    Ok((summary.to_string(), grounded_confidence(answer.confidence, hits)))
}

// ── Research ─────────────────────────────────────────────────────────────────

pub struct ResearchAgent {
    search: Arc<dyn SearchProvider>,
    reasoning: Arc<dyn ReasoningProvider>,
    max_results: usize,
}

impl ResearchAgent {
    pub fn new(search: Arc<dyn SearchProvider>, reasoning: Arc<dyn ReasoningProvider>) -> Self {
        Self {
            search,
            reasoning,
            max_results: 5,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }
}

#[async_trait]
impl Agent for ResearchAgent {
    fn id(&self) -> AgentId {
        AgentId::Research
    }

    async fn invoke(&self, view: AgentView) -> Result<Finding, AgentError> {
        let context = view.context_text();
        let features = QueryFeatures::extract(&view.query, context.as_deref());
        // A grounding revision widens the search.
        let max_results = if wants_more_sources(&view) {
            self.max_results * 2
        } else {
            self.max_results
        };

        let hits = self
            .search
            .search(&SearchQuery {
                text: view.query.clone(),
                bodies: features.bodies.clone(),
                strategy: ResearchStrategy::General,
                max_results,
                deadline: view.deadline,
            })
            .await?;
        debug!(run_id = %view.run_id, hits = hits.len(), max_results, "research search complete");

        let (summary, confidence) = synthesize(self.reasoning.as_ref(), &view, &hits).await?;
        Ok(Finding::new(
            AgentId::Research,
            FindingContent::Research {
                summary,
                topics: features.topic_names(),
                regulatory_bodies: features.bodies,
            },
            hits.iter().map(SearchHit::citation).collect(),
            confidence,
        ))
    }
}

// ── Research coordinator ─────────────────────────────────────────────────────

/// Multi-strategy research with web-grounded synthesis.
///
/// The general search must succeed; a failing secondary strategy only
/// narrows the evidence.
pub struct ResearchCoordinatorAgent {
    search: Arc<dyn SearchProvider>,
    reasoning: Arc<dyn ReasoningProvider>,
    per_strategy: usize,
}

impl ResearchCoordinatorAgent {
    pub fn new(search: Arc<dyn SearchProvider>, reasoning: Arc<dyn ReasoningProvider>) -> Self {
        Self {
            search,
            reasoning,
            per_strategy: 3,
        }
    }

    fn query_for(&self, strategy: ResearchStrategy, view: &AgentView, features: &QueryFeatures) -> SearchQuery {
        let (text, bodies) = match strategy {
            ResearchStrategy::General => (view.query.clone(), features.bodies.clone()),
            ResearchStrategy::RegulatoryUpdates => {
                let bodies = if features.bodies.is_empty() {
                    DEFAULT_MONITORED_BODIES.iter().map(|b| b.to_string()).collect()
                } else {
                    features.bodies.clone()
                };
                (format!("recent regulatory updates {}", features.keywords.join(" ")), bodies)
            }
            ResearchStrategy::ComplianceAnalysis => (
                format!("compliance requirements {} {}", view.query, features.frameworks.join(" ")),
                features.bodies.clone(),
            ),
            ResearchStrategy::InternationalHarmonization => {
                (format!("international harmonization {}", view.query), Vec::new())
            }
        };
        let max_results = if wants_more_sources(view) {
            self.per_strategy * 2
        } else {
            self.per_strategy
        };
        SearchQuery {
            text: text.trim().to_string(),
            bodies,
            strategy,
            max_results,
            deadline: view.deadline,
        }
    }
}

#[async_trait]
impl Agent for ResearchCoordinatorAgent {
    fn id(&self) -> AgentId {
        AgentId::ResearchCoordinator
    }

    async fn invoke(&self, view: AgentView) -> Result<Finding, AgentError> {
        let context = view.context_text();
        let features = QueryFeatures::extract(&view.query, context.as_deref());

        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        for strategy in &features.strategies {
            let query = self.query_for(*strategy, &view, &features);
            match self.search.search(&query).await {
                Ok(found) => hits.extend(found.into_iter().filter(|h| seen.insert(h.id.clone()))),
                Err(e) if *strategy == ResearchStrategy::General => return Err(e.into()),
                Err(e) => warn!(
                    run_id = %view.run_id,
                    strategy = %strategy,
                    error = %e,
                    "secondary research strategy failed"
                ),
            }
        }
        debug!(
            run_id = %view.run_id,
            strategies = features.strategies.len(),
            hits = hits.len(),
            "coordinated research complete"
        );

        let (summary, confidence) = synthesize(self.reasoning.as_ref(), &view, &hits).await?;
        Ok(Finding::new(
            AgentId::ResearchCoordinator,
            FindingContent::Research {
                summary,
                topics: features.topic_names(),
                regulatory_bodies: features.bodies,
            },
            hits.iter().map(SearchHit::citation).collect(),
            confidence,
        ))
    }
}
