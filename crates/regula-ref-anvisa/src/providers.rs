//! Deterministic capability providers backed by the offline corpus.
//!
//! `CorpusSearch` ranks documents by keyword overlap. `CorpusReasoning`
//! answers from whichever documents the evidence cites, so the same
//! evidence always yields the same answer.

use std::collections::BTreeSet;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use regula_agents::capability::{
    CapabilityError, Reasoning, ReasoningProvider, ReasoningRequest, ReasoningTask, SearchHit, SearchProvider,
    SearchQuery,
};
use regula_contracts::finding::ComplianceVerdict;

use crate::corpus::{document, Document, CORPUS};

/// Phrases that describe selling or operating without the required
/// authorization.
const UNAUTHORIZED_MARKERS: [&str; 6] = [
    "sem registro",
    "sem notificação",
    "without registration",
    "without notification",
    "unregistered",
    "without authorization",
];

fn relevance(matches: usize) -> f64 {
    (0.55 + 0.15 * matches as f64).min(0.98)
}

fn expired(deadline: Instant) -> bool {
    Instant::now() >= deadline
}

// ── Search ───────────────────────────────────────────────────────────────────

/// Keyword search over `CORPUS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorpusSearch;

#[async_trait]
impl SearchProvider for CorpusSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, CapabilityError> {
        if expired(query.deadline) {
            return Err(CapabilityError::Timeout {
                reason: "search deadline already passed".to_string(),
            });
        }
        let text = query.text.to_lowercase();
        let mut ranked: Vec<(usize, &Document)> = CORPUS
            .iter()
            .filter(|d| query.bodies.is_empty() || query.bodies.iter().any(|b| b == d.body))
            .map(|d| (d.matches(&text), d))
            .filter(|(matches, _)| *matches > 0)
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.id.cmp(b.1.id)));

        let hits: Vec<SearchHit> = ranked
            .into_iter()
            .take(query.max_results)
            .map(|(matches, d)| SearchHit {
                id: d.id.to_string(),
                url: d.url.to_string(),
                title: d.title.to_string(),
                excerpt: d.summary.to_string(),
                regulatory_body: Some(d.body.to_string()),
                relevance: relevance(matches),
            })
            .collect();
        debug!(strategy = %query.strategy, hits = hits.len(), "corpus search");
        Ok(hits)
    }
}

// ── Reasoning ────────────────────────────────────────────────────────────────

/// Documents cited by `[id]`-prefixed evidence lines, in first-cited order.
fn cited(evidence: &[String]) -> Vec<&'static Document> {
    let mut seen = BTreeSet::new();
    evidence
        .iter()
        .filter_map(|line| line.strip_prefix('[')?.split_once(']'))
        .filter_map(|(id, _)| document(id))
        .filter(|d| seen.insert(d.id))
        .collect()
}

fn titles(docs: &[&Document]) -> String {
    docs.iter().map(|d| d.title).collect::<Vec<_>>().join(", ")
}

fn position(query: &str) -> ComplianceVerdict {
    let lower = query.to_lowercase();
    if UNAUTHORIZED_MARKERS.iter().any(|m| lower.contains(m)) {
        ComplianceVerdict::NonCompliant
    } else {
        ComplianceVerdict::Conditional
    }
}

/// Rule-based reasoning over the cited documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorpusReasoning;

impl CorpusReasoning {
    fn answer(&self, request: &ReasoningRequest) -> Reasoning {
        let docs = cited(&request.evidence);
        let unsourced = |text: &str| Reasoning {
            text: text.to_string(),
            verdict: Some(ComplianceVerdict::Undetermined),
            items: vec![],
            confidence: 0.45,
        };

        match request.task {
            ReasoningTask::Synthesize => match docs.first() {
                None => Reasoning {
                    text: "No indexed Brazilian regulatory instrument addresses this query.".to_string(),
                    verdict: None,
                    items: vec![],
                    confidence: 0.4,
                },
                Some(first) => Reasoning {
                    text: format!("{} apply. {}", titles(&docs), first.summary),
                    verdict: None,
                    items: docs.iter().map(|d| d.title.to_string()).collect(),
                    confidence: 0.9,
                },
            },
            ReasoningTask::AssessCompliance if docs.is_empty() => {
                unsourced("Insufficient sources to assess compliance.")
            }
            ReasoningTask::AssessCompliance => {
                let mut seen = BTreeSet::new();
                let requirements: Vec<String> = docs
                    .iter()
                    .flat_map(|d| d.requirements.iter())
                    .filter(|r| seen.insert(**r))
                    .map(|r| r.to_string())
                    .collect();
                let verdict = position(&request.query);
                Reasoning {
                    text: format!(
                        "{}: {} requirement(s) under {} must be met",
                        verdict.as_str(),
                        requirements.len(),
                        titles(&docs)
                    ),
                    verdict: Some(verdict),
                    items: requirements,
                    confidence: 0.85,
                }
            }
            ReasoningTask::AnalyzeLegal if docs.is_empty() => {
                unsourced("No governing framework could be identified.")
            }
            ReasoningTask::AnalyzeLegal => {
                let verdict = position(&request.query);
                Reasoning {
                    text: format!("{} govern the activity; position is {}", titles(&docs), verdict.as_str()),
                    verdict: Some(verdict),
                    items: docs.iter().map(|d| d.title.to_string()).collect(),
                    confidence: 0.85,
                }
            }
            ReasoningTask::ReconcileVerdicts => Reasoning {
                text: format!(
                    "The positions differ in scope ({}). The stricter reading prevails until the \
                     authority confirms the product's regularization.",
                    request.evidence.join(" / ")
                ),
                verdict: None,
                items: vec![],
                confidence: 0.8,
            },
        }
    }
}

#[async_trait]
impl ReasoningProvider for CorpusReasoning {
    async fn reason(&self, request: &ReasoningRequest) -> Result<Reasoning, CapabilityError> {
        if expired(request.deadline) {
            return Err(CapabilityError::Timeout {
                reason: "reasoning deadline already passed".to_string(),
            });
        }
        Ok(self.answer(request))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use regula_agents::extract::ResearchStrategy;

    use super::*;

    fn query(text: &str, bodies: &[&str], max_results: usize) -> SearchQuery {
        SearchQuery {
            text: text.to_string(),
            bodies: bodies.iter().map(|b| b.to_string()).collect(),
            strategy: ResearchStrategy::General,
            max_results,
            deadline: Instant::now() + Duration::from_secs(5),
        }
    }

    fn request(task: ReasoningTask, query: &str, evidence: &[&str]) -> ReasoningRequest {
        ReasoningRequest {
            task,
            query: query.to_string(),
            context: None,
            evidence: evidence.iter().map(|e| e.to_string()).collect(),
            hints: vec![],
            deadline: Instant::now() + Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn search_ranks_by_overlap_and_filters_by_body() {
        let hits = CorpusSearch
            .search(&query("Class II medical device registration with ANVISA", &["ANVISA"], 5))
            .await
            .unwrap();
        assert_eq!(hits[0].id, "rdc-751-2022");
        assert!(hits.windows(2).all(|w| w[0].relevance >= w[1].relevance));
        assert!(hits.iter().all(|h| h.regulatory_body.as_deref() == Some("ANVISA")));

        let anatel = CorpusSearch
            .search(&query("Class II medical device registration", &["ANATEL"], 5))
            .await
            .unwrap();
        assert!(anatel.is_empty());
    }

    #[tokio::test]
    async fn search_respects_max_results() {
        let hits = CorpusSearch.search(&query("device registration", &[], 2)).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn expired_deadline_times_out() {
        let mut q = query("device", &[], 5);
        q.deadline = Instant::now() - Duration::from_millis(1);
        let err = CorpusSearch.search(&q).await.unwrap_err();
        assert!(matches!(err, CapabilityError::Timeout { .. }));
    }

    #[tokio::test]
    async fn compliance_lists_requirements_of_cited_documents() {
        let answer = CorpusReasoning
            .reason(&request(
                ReasoningTask::AssessCompliance,
                "class II pump registration",
                &["research: summary", "[rdc-751-2022] excerpt", "[rdc-665-2022] excerpt"],
            ))
            .await
            .unwrap();
        assert_eq!(answer.verdict, Some(ComplianceVerdict::Conditional));
        assert_eq!(answer.items.len(), 5);
        assert!(answer.text.contains("RDC 751/2022, RDC 665/2022"));
    }

    #[tokio::test]
    async fn unauthorized_sale_is_non_compliant() {
        let answer = CorpusReasoning
            .reason(&request(
                ReasoningTask::AnalyzeLegal,
                "Can we sell the pump without registration?",
                &["[lei-6360-1976] excerpt"],
            ))
            .await
            .unwrap();
        assert_eq!(answer.verdict, Some(ComplianceVerdict::NonCompliant));
        assert_eq!(answer.items, vec!["Lei 6.360/1976"]);
    }

    #[tokio::test]
    async fn no_evidence_is_undetermined() {
        for task in [ReasoningTask::AssessCompliance, ReasoningTask::AnalyzeLegal] {
            let answer = CorpusReasoning.reason(&request(task, "q", &[])).await.unwrap();
            assert_eq!(answer.verdict, Some(ComplianceVerdict::Undetermined));
            assert!(answer.confidence < 0.5);
        }
        let synthesis = CorpusReasoning
            .reason(&request(ReasoningTask::Synthesize, "q", &["[unknown-doc] x"]))
            .await
            .unwrap();
        assert!(synthesis.text.starts_with("No indexed"));
    }
}
