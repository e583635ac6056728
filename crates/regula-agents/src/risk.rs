//! Risk assessment over a probability x impact matrix.
//!
//! Probabilities follow the compliance and legal verdicts already on
//! record; impact follows the regulatory topic. When the two verdicts
//! contradict each other the assessment asks its reasoning backend for a
//! reconciliation, which quality control requires before accepting.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use regula_contracts::{
    agent::{AgentId, AgentView},
    error::AgentError,
    finding::{ComplianceVerdict, Finding, FindingContent, RiskItem, RiskRating},
    request::Priority,
};
use regula_core::traits::Agent;

use crate::{
    capability::{ReasoningProvider, ReasoningRequest, ReasoningTask},
    extract::{QueryFeatures, Topic},
};

/// Likelihood (1..=5) that a verdict turns into a regulatory problem.
fn verdict_probability(verdict: Option<ComplianceVerdict>) -> u8 {
    match verdict {
        Some(ComplianceVerdict::Compliant) => 1,
        Some(ComplianceVerdict::Conditional) => 2,
        Some(ComplianceVerdict::Undetermined) | None => 3,
        Some(ComplianceVerdict::NonCompliant) => 4,
    }
}

/// Severity (1..=5) of getting the topic wrong.
fn topic_impact(topics: &[Topic]) -> u8 {
    topics
        .iter()
        .map(|t| match t {
            Topic::MedicalDevices | Topic::Drugs => 5,
            Topic::Food | Topic::Cosmetics => 4,
            _ => 3,
        })
        .max()
        .unwrap_or(3)
}

fn timeline_probability(priority: Priority) -> u8 {
    match priority {
        Priority::Low => 1,
        Priority::Medium => 2,
        Priority::High => 3,
        Priority::Critical => 4,
    }
}

fn item(id: &str, name: &str, category: &str, probability: u8, impact: u8) -> RiskItem {
    RiskItem {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        probability: probability.clamp(1, 5),
        impact: impact.clamp(1, 5),
    }
}

/// Build the risk matrix. Items are in a fixed order.
pub fn risk_matrix(
    compliance: Option<ComplianceVerdict>,
    legal: Option<ComplianceVerdict>,
    topics: &[Topic],
    priority: Priority,
) -> Vec<RiskItem> {
    let impact = topic_impact(topics);
    let mut items = vec![
        item(
            "regulatory-approval",
            "Regulatory approval delayed or denied",
            "regulatory",
            verdict_probability(compliance.or(legal)),
            impact,
        ),
        item(
            "legal-exposure",
            "Sanctions under the governing legal framework",
            "legal",
            verdict_probability(legal.or(compliance)),
            impact.saturating_sub(1),
        ),
        item(
            "regulatory-change",
            "Applicable rules change before completion",
            "regulatory",
            2,
            3,
        ),
    ];
    if topics.contains(&Topic::DataProtection) {
        items.push(item(
            "data-protection",
            "Personal data processed without a legal basis",
            "data_protection",
            3,
            4,
        ));
    }
    items.push(item(
        "timeline",
        "Deadline pressure on the regulatory timeline",
        "operational",
        timeline_probability(priority),
        3,
    ));
    items
}

pub struct RiskAssessmentAgent {
    reasoning: Arc<dyn ReasoningProvider>,
}

impl RiskAssessmentAgent {
    pub fn new(reasoning: Arc<dyn ReasoningProvider>) -> Self {
        Self { reasoning }
    }

    async fn reconcile(
        &self,
        view: &AgentView,
        compliance: &Finding,
        legal: &Finding,
    ) -> Result<(String, f64), AgentError> {
        let answer = self
            .reasoning
            .reason(&ReasoningRequest {
                task: ReasoningTask::ReconcileVerdicts,
                query: view.query.clone(),
                context: view.context_text(),
                evidence: vec![
                    format!("compliance: {}", compliance.summary()),
                    format!("legal_analysis: {}", legal.summary()),
                ],
                hints: view.revision_hints.clone(),
                deadline: view.deadline,
            })
            .await?;
        let text = answer.text.trim();
        if text.is_empty() {
            return Err(AgentError::permanent("reasoning returned an empty reconciliation"));
        }
        Ok((text.to_string(), answer.confidence))
    }
}

#[async_trait]
impl Agent for RiskAssessmentAgent {
    fn id(&self) -> AgentId {
        AgentId::RiskAssessment
    }

    async fn invoke(&self, view: AgentView) -> Result<Finding, AgentError> {
        let context = view.context_text();
        let features = QueryFeatures::extract(&view.query, context.as_deref());
        let compliance = view.latest_from(AgentId::Compliance);
        let legal = view.latest_from(AgentId::LegalAnalysis);
        let compliance_verdict = compliance.and_then(|f| f.content.verdict());
        let legal_verdict = legal.and_then(|f| f.content.verdict());

        let risks = risk_matrix(compliance_verdict, legal_verdict, &features.topics, view.priority);
        let Some(worst) = risks.iter().max_by_key(|r| r.score()) else {
            return Err(AgentError::permanent("risk matrix is empty"));
        };
        let rating = RiskRating::from_score(worst.score());

        let upstream: Vec<f64> = [compliance, legal].into_iter().flatten().map(|f| f.confidence).collect();
        let mut confidence = if upstream.is_empty() {
            0.5
        } else {
            upstream.iter().sum::<f64>() / upstream.len() as f64
        };

        let mut reconciliation = None;
        if let (Some(c), Some(l), Some(cv), Some(lv)) = (compliance, legal, compliance_verdict, legal_verdict) {
            if cv.contradicts(&lv) {
                let (text, reasoning_confidence) = self.reconcile(&view, c, l).await?;
                info!(
                    run_id = %view.run_id,
                    compliance = cv.as_str(),
                    legal_analysis = lv.as_str(),
                    "conflicting verdicts reconciled"
                );
                confidence = confidence.min(reasoning_confidence);
                reconciliation = Some(text);
            }
        }

        let summary = format!(
            "Overall risk {}: highest item '{}' scores {} of 25 across {} assessed risks",
            rating.as_str(),
            worst.name,
            worst.score(),
            risks.len()
        );
        debug!(run_id = %view.run_id, rating = rating.as_str(), risks = risks.len(), "risk assessed");

        Ok(Finding::new(
            AgentId::RiskAssessment,
            FindingContent::RiskAssessment {
                summary,
                rating,
                risks,
                reconciliation,
            },
            vec![],
            confidence,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::capability::CapabilityError;
    use crate::testing::{reasoning, view, StaticReasoning};

    fn verdict_finding(agent: AgentId, verdict: ComplianceVerdict, confidence: f64) -> Finding {
        let content = match agent {
            AgentId::Compliance => FindingContent::Compliance {
                summary: format!("compliance finds {}", verdict.as_str()),
                verdict,
                requirements: vec![],
            },
            _ => FindingContent::LegalAnalysis {
                summary: format!("legal finds {}", verdict.as_str()),
                verdict,
                frameworks: vec![],
            },
        };
        Finding::new(agent, content, vec![], confidence)
    }

    #[test]
    fn matrix_scales_with_verdict_and_topic() {
        let devices = risk_matrix(
            Some(ComplianceVerdict::NonCompliant),
            None,
            &[Topic::MedicalDevices],
            Priority::Low,
        );
        assert_eq!(devices[0].id, "regulatory-approval");
        assert_eq!(devices[0].score(), 20);

        let telecom = risk_matrix(Some(ComplianceVerdict::Compliant), None, &[Topic::Telecom], Priority::Low);
        assert_eq!(telecom[0].score(), 3);
        assert!(telecom.iter().all(|r| r.id != "data-protection"));

        let privacy = risk_matrix(None, None, &[Topic::DataProtection], Priority::Critical);
        assert!(privacy.iter().any(|r| r.id == "data-protection"));
        assert_eq!(privacy.last().unwrap().probability, 4);
    }

    #[test]
    fn every_item_stays_on_the_five_point_scales() {
        let verdicts = [
            None,
            Some(ComplianceVerdict::Compliant),
            Some(ComplianceVerdict::NonCompliant),
            Some(ComplianceVerdict::Conditional),
            Some(ComplianceVerdict::Undetermined),
        ];
        for c in verdicts {
            for l in verdicts {
                for priority in Priority::ALL {
                    for r in risk_matrix(c, l, &Topic::ALL, priority) {
                        assert!((1..=5).contains(&r.probability), "{r:?}");
                        assert!((1..=5).contains(&r.impact), "{r:?}");
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn agreeing_verdicts_need_no_reconciliation() {
        let reasoner = Arc::new(StaticReasoning::new(reasoning("unused", None, 0.9)));
        let agent = RiskAssessmentAgent::new(reasoner.clone());
        let mut v = view(AgentId::RiskAssessment, "ANVISA device registration");
        v.prior_findings.push(verdict_finding(AgentId::Compliance, ComplianceVerdict::Conditional, 0.8));
        v.prior_findings.push(verdict_finding(AgentId::LegalAnalysis, ComplianceVerdict::Compliant, 0.6));

        let finding = agent.invoke(v).await.unwrap();

        match &finding.content {
            FindingContent::RiskAssessment { rating, reconciliation, risks, .. } => {
                // conditional (2) x device impact (5)
                assert_eq!(*rating, RiskRating::High);
                assert_eq!(risks[0].score(), 10);
                assert!(reconciliation.is_none());
            }
            other => panic!("unexpected content {other:?}"),
        }
        assert!((finding.confidence - 0.7).abs() < 1e-9);
        assert!(reasoner.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn contradicting_verdicts_are_reconciled() {
        let reasoner = Arc::new(StaticReasoning::new(reasoning(
            "Compliance read the old RDC 185/2001; RDC 751/2022 now requires registration",
            None,
            0.6,
        )));
        let agent = RiskAssessmentAgent::new(reasoner.clone());
        let mut v = view(AgentId::RiskAssessment, "ANVISA device registration");
        v.prior_findings.push(verdict_finding(AgentId::Compliance, ComplianceVerdict::Compliant, 0.9));
        v.prior_findings.push(verdict_finding(AgentId::LegalAnalysis, ComplianceVerdict::NonCompliant, 0.9));

        let finding = agent.invoke(v).await.unwrap();

        match &finding.content {
            FindingContent::RiskAssessment { reconciliation, .. } => {
                assert!(reconciliation.as_deref().unwrap().contains("RDC 751/2022"));
            }
            other => panic!("unexpected content {other:?}"),
        }
        assert_eq!(finding.confidence, 0.6);
        let requests = reasoner.requests.lock().unwrap();
        assert_eq!(requests[0].task, ReasoningTask::ReconcileVerdicts);
        assert_eq!(requests[0].evidence.len(), 2);
    }

    #[tokio::test]
    async fn reconciliation_failure_propagates() {
        let mut reasoner = StaticReasoning::new(reasoning("x", None, 0.9));
        reasoner.error = Some(CapabilityError::RateLimited { reason: "429".into() });
        let agent = RiskAssessmentAgent::new(Arc::new(reasoner));
        let mut v = view(AgentId::RiskAssessment, "q");
        v.prior_findings.push(verdict_finding(AgentId::Compliance, ComplianceVerdict::Compliant, 0.9));
        v.prior_findings.push(verdict_finding(AgentId::LegalAnalysis, ComplianceVerdict::NonCompliant, 0.9));

        assert!(agent.invoke(v).await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn no_upstream_verdicts_still_assesses() {
        let agent = RiskAssessmentAgent::new(Arc::new(StaticReasoning::new(reasoning("x", None, 0.9))));
        let finding = agent.invoke(view(AgentId::RiskAssessment, "food supplement labeling")).await.unwrap();
        // undetermined (3) x food impact (4)
        assert!(matches!(
            finding.content,
            FindingContent::RiskAssessment { rating: RiskRating::High, .. }
        ));
        assert_eq!(finding.confidence, 0.5);
    }
}
