//! The REGULA quality control gate.
//!
//! `RegulatoryGate` implements the `QualityGate` trait from `regula-core`.
//! Every evaluation runs five checks in a fixed order and collects all of
//! their failures before deciding:
//!
//! 1. **Coverage**: every required agent has a finding.
//! 2. **Grounding**: compliance and legal analysis rest on cited research.
//! 3. **Structure**: each latest finding validates against its agent's JSON
//!    Schema.
//! 4. **Consistency**: contradictory compliance verdicts need a reconciling
//!    risk assessment.
//! 5. **Confidence**: the weighted mean reaches the priority's floor.
//!
//! Verdict precedence is `fail` > `revise` > `degrade` > `accept`. Only the
//! latest finding of each agent is judged.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use regula_contracts::{
    agent::AgentId,
    error::{RegulaError, RegulaResult},
    finding::{Finding, FindingContent},
    quality::{weighted_confidence, GateInput, QualityCheck, QualityFailure, QualityReport, QualityVerdict},
};
use regula_core::traits::QualityGate;

use crate::schema::default_schema;

type Latest<'a> = BTreeMap<AgentId, &'a Finding>;

/// The REGULA quality gate.
///
/// Content schemas are compiled once at construction, so `evaluate` is a
/// pure function of its input.
pub struct RegulatoryGate {
    validators: BTreeMap<AgentId, jsonschema::Validator>,
}

impl RegulatoryGate {
    /// A gate using the built-in schema for every agent.
    pub fn new() -> RegulaResult<Self> {
        let mut validators = BTreeMap::new();
        for agent in AgentId::ALL {
            validators.insert(agent, compile(agent, &default_schema(agent))?);
        }
        Ok(Self { validators })
    }

    /// Replace the content schema for `agent`.
    ///
    /// # Errors
    ///
    /// `RegulaError::Schema` when the document does not compile.
    pub fn with_schema(mut self, agent: AgentId, schema: &serde_json::Value) -> RegulaResult<Self> {
        self.validators.insert(agent, compile(agent, schema)?);
        Ok(self)
    }

    // ── Checks ────────────────────────────────────────────────────────────────

    fn check_coverage(&self, input: &GateInput<'_>, latest: &Latest<'_>, failures: &mut Vec<QualityFailure>) {
        for agent in input.required {
            if latest.contains_key(agent) {
                continue;
            }
            let message = match input.gaps.iter().rev().find(|g| g.agent == *agent) {
                Some(gap) => format!("no finding ({})", gap.reason),
                None => "no finding".to_string(),
            };
            failures.push(QualityFailure {
                check: QualityCheck::Coverage,
                agent: Some(*agent),
                message,
                repairable: input.can_revise(*agent),
            });
        }
    }

    fn check_grounding(&self, input: &GateInput<'_>, latest: &Latest<'_>, failures: &mut Vec<QualityFailure>) {
        let needs_grounding =
            latest.contains_key(&AgentId::Compliance) || latest.contains_key(&AgentId::LegalAnalysis);
        if !needs_grounding {
            return;
        }
        let research: Vec<(AgentId, &Finding)> = latest
            .iter()
            .filter(|(agent, _)| agent.is_research_class())
            .map(|(agent, f)| (*agent, *f))
            .collect();
        let total: usize = research.iter().map(|(_, f)| f.citations.len()).sum();
        let min = input.criteria.min_research_citations;
        if total >= min {
            return;
        }

        // Missing research entirely is a coverage failure already.
        let uncited: Vec<AgentId> = research
            .iter()
            .filter(|(_, f)| f.citations.is_empty())
            .map(|(agent, _)| *agent)
            .collect();
        let targets = if uncited.is_empty() {
            research.iter().map(|(agent, _)| *agent).collect()
        } else {
            uncited
        };
        for agent in targets {
            failures.push(QualityFailure {
                check: QualityCheck::Grounding,
                agent: Some(agent),
                message: format!("research carries {total} citation(s), {min} required to ground compliance"),
                repairable: input.can_revise(agent),
            });
        }
    }

    fn check_structure(
        &self,
        input: &GateInput<'_>,
        latest: &Latest<'_>,
        failures: &mut Vec<QualityFailure>,
    ) -> RegulaResult<()> {
        for (agent, finding) in latest {
            if !finding.content.fits(*agent) {
                failures.push(QualityFailure {
                    check: QualityCheck::Structure,
                    agent: Some(*agent),
                    message: format!("content kind does not belong to {agent}"),
                    repairable: input.can_revise(*agent),
                });
                continue;
            }
            let Some(validator) = self.validators.get(agent) else {
                continue;
            };
            let payload = serde_json::to_value(&finding.content).map_err(|e| RegulaError::Schema {
                reason: format!("failed to serialize {agent} content: {e}"),
            })?;
            for error in validator.iter_errors(&payload) {
                let message = format!("JSON Schema violation at {}: {}", error.instance_path, error);
                warn!(agent = %agent, %message, "structural validation failure");
                failures.push(QualityFailure {
                    check: QualityCheck::Structure,
                    agent: Some(*agent),
                    message,
                    repairable: input.can_revise(*agent),
                });
            }
        }
        Ok(())
    }

    /// Returns the contradiction when no agent can repair it.
    fn check_consistency(
        &self,
        input: &GateInput<'_>,
        latest: &Latest<'_>,
        failures: &mut Vec<QualityFailure>,
    ) -> Option<String> {
        let compliance = latest.get(&AgentId::Compliance)?;
        let legal = latest.get(&AgentId::LegalAnalysis)?;
        let (c, l) = (compliance.content.verdict()?, legal.content.verdict()?);
        if !c.contradicts(&l) {
            return None;
        }

        let contradiction = format!(
            "compliance says {}, legal_analysis says {}",
            c.as_str(),
            l.as_str()
        );
        let newest_verdict = compliance.created_at.max(legal.created_at);
        let risk = latest.get(&AgentId::RiskAssessment);

        let (message, repairable) = match risk {
            Some(r) if r.created_at > newest_verdict => {
                if reconciliation(r).is_some() {
                    return None;
                }
                ("risk assessment does not reconcile the conflicting verdicts", false)
            }
            Some(_) => (
                "risk assessment predates the conflicting verdicts",
                input.can_revise(AgentId::RiskAssessment),
            ),
            None => (
                "no risk assessment reconciles the conflicting verdicts",
                input.can_revise(AgentId::RiskAssessment),
            ),
        };

        failures.push(QualityFailure {
            check: QualityCheck::Consistency,
            agent: repairable.then_some(AgentId::RiskAssessment),
            message: format!("{contradiction}: {message}"),
            repairable,
        });
        (!repairable).then_some(contradiction)
    }

    fn check_confidence(
        &self,
        input: &GateInput<'_>,
        latest: &Latest<'_>,
        aggregate: f64,
        failures: &mut Vec<QualityFailure>,
    ) {
        let floor = input.criteria.confidence_floor;
        if aggregate >= floor {
            return;
        }
        let mut low: Vec<(AgentId, f64)> = latest
            .iter()
            .filter(|(agent, f)| input.criteria.weights.weight(**agent) > 0.0 && f.confidence < floor)
            .map(|(agent, f)| (*agent, f.confidence))
            .collect();
        low.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        if low.is_empty() {
            failures.push(QualityFailure {
                check: QualityCheck::Confidence,
                agent: None,
                message: format!("aggregate confidence {aggregate:.2} below floor {floor:.2}"),
                repairable: false,
            });
        }
        for (agent, confidence) in low {
            failures.push(QualityFailure {
                check: QualityCheck::Confidence,
                agent: Some(agent),
                message: format!(
                    "confidence {confidence:.2} below floor {floor:.2} (aggregate {aggregate:.2})"
                ),
                repairable: input.can_revise(agent),
            });
        }
    }
}

impl QualityGate for RegulatoryGate {
    fn evaluate(&self, input: &GateInput<'_>) -> RegulaResult<QualityReport> {
        let latest = input.state.latest_findings();
        let aggregate = weighted_confidence(&latest, &input.criteria.weights);
        let mut failures = Vec::new();

        self.check_coverage(input, &latest, &mut failures);
        self.check_grounding(input, &latest, &mut failures);
        self.check_structure(input, &latest, &mut failures)?;
        let contradiction = self.check_consistency(input, &latest, &mut failures);
        self.check_confidence(input, &latest, aggregate, &mut failures);

        for failure in &failures {
            debug!(
                run_id = %input.state.run_id(),
                check = %failure.check,
                agent = ?failure.agent,
                repairable = failure.repairable,
                message = %failure.message,
                "quality check failed"
            );
        }

        let targets: BTreeSet<AgentId> = failures
            .iter()
            .filter(|f| f.repairable)
            .filter_map(|f| f.agent)
            .collect();

        let verdict = if let Some(contradiction) = contradiction {
            QualityVerdict::Fail { contradiction }
        } else if !targets.is_empty() {
            QualityVerdict::Revise {
                targets: targets.into_iter().collect(),
            }
        } else if !failures.is_empty() {
            QualityVerdict::Degrade {
                gaps: input.gaps.to_vec(),
            }
        } else {
            QualityVerdict::Accept
        };

        Ok(QualityReport {
            verdict,
            failures,
            aggregate_confidence: aggregate,
        })
    }
}

fn compile(agent: AgentId, schema: &serde_json::Value) -> RegulaResult<jsonschema::Validator> {
    jsonschema::validator_for(schema).map_err(|e| RegulaError::Schema {
        reason: format!("invalid content schema for {agent}: {e}"),
    })
}

fn reconciliation(finding: &Finding) -> Option<&str> {
    match &finding.content {
        FindingContent::RiskAssessment {
            reconciliation: Some(text),
            ..
        } if !text.trim().is_empty() => Some(text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use regula_contracts::{
        execution::{Node, TraceOutcome},
        finding::{Citation, ComplianceVerdict, RiskRating},
        quality::{AgentWeights, QualityCriteria},
        request::{AnalysisRequest, Priority},
        state::{AnalysisState, CoverageGap, GapReason},
    };
    use serde_json::json;

    use super::*;

    const REQUIRED: [AgentId; 4] = [
        AgentId::Research,
        AgentId::Compliance,
        AgentId::LegalAnalysis,
        AgentId::RiskAssessment,
    ];

    fn criteria() -> QualityCriteria {
        QualityCriteria {
            confidence_floor: 0.7,
            weights: AgentWeights::default(),
            min_research_citations: 1,
        }
    }

    fn state() -> AnalysisState {
        AnalysisState::new(&AnalysisRequest::new(
            "ANVISA class II device registration requirements",
            Priority::High,
        ))
    }

    fn push(state: &mut AnalysisState, agent: AgentId, content: FindingContent, citations: Vec<Citation>, confidence: f64) {
        state.record(
            Node::Agent(agent),
            Utc::now(),
            TraceOutcome::Contributed {
                confidence,
                attempts: 1,
            },
            "test",
        );
        state
            .append_finding(Finding::new(agent, content, citations, confidence))
            .unwrap();
    }

    fn research(cited: bool) -> (FindingContent, Vec<Citation>) {
        let citations = if cited {
            vec![Citation::new("rdc-751-2022", "https://www.in.gov.br/rdc-751", "classification rules")]
        } else {
            vec![]
        };
        (
            FindingContent::Research {
                summary: "RDC 751/2022 governs device classification".to_string(),
                topics: vec!["medical_devices".to_string()],
                regulatory_bodies: vec!["ANVISA".to_string()],
            },
            citations,
        )
    }

    fn compliance(verdict: ComplianceVerdict) -> FindingContent {
        FindingContent::Compliance {
            summary: "class II devices need notification".to_string(),
            verdict,
            requirements: vec!["technical dossier".to_string()],
        }
    }

    fn legal(verdict: ComplianceVerdict) -> FindingContent {
        FindingContent::LegalAnalysis {
            summary: "Lei 6.360/1976 applies".to_string(),
            verdict,
            frameworks: vec!["Lei 6.360/1976".to_string()],
        }
    }

    fn risk(reconciliation: Option<&str>) -> FindingContent {
        FindingContent::RiskAssessment {
            summary: "moderate regulatory risk".to_string(),
            rating: RiskRating::Moderate,
            risks: vec![],
            reconciliation: reconciliation.map(str::to_string),
        }
    }

    /// Research, compliance, legal and risk, all consistent and confident.
    fn complete(confidence: f64) -> AnalysisState {
        let mut s = state();
        let (content, citations) = research(true);
        push(&mut s, AgentId::Research, content, citations, confidence);
        push(&mut s, AgentId::Compliance, compliance(ComplianceVerdict::Conditional), vec![], confidence);
        push(&mut s, AgentId::LegalAnalysis, legal(ComplianceVerdict::Conditional), vec![], confidence);
        push(&mut s, AgentId::RiskAssessment, risk(None), vec![], confidence);
        s
    }

    fn evaluate(state: &AnalysisState, required: &[AgentId], gaps: &[CoverageGap]) -> QualityReport {
        let criteria = criteria();
        RegulatoryGate::new()
            .unwrap()
            .evaluate(&GateInput {
                state,
                required,
                gaps,
                criteria: &criteria,
            })
            .unwrap()
    }

    #[test]
    fn complete_confident_analysis_is_accepted() {
        let report = evaluate(&complete(0.9), &REQUIRED, &[]);
        assert_eq!(report.verdict, QualityVerdict::Accept);
        assert!(report.failures.is_empty());
        assert!((report.aggregate_confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn uncited_research_under_compliance_revises_research() {
        let mut s = state();
        let (content, citations) = research(false);
        push(&mut s, AgentId::Research, content, citations, 0.9);
        push(&mut s, AgentId::Compliance, compliance(ComplianceVerdict::Compliant), vec![], 0.9);

        let report = evaluate(&s, &[AgentId::Research, AgentId::Compliance], &[]);

        assert_eq!(
            report.verdict,
            QualityVerdict::Revise {
                targets: vec![AgentId::Research]
            }
        );
        assert_eq!(report.failures[0].check, QualityCheck::Grounding);
        assert!(report.hints_for(AgentId::Research)[0].starts_with("grounding:"));
    }

    #[test]
    fn uncited_research_alone_needs_no_grounding() {
        let mut s = state();
        let (content, citations) = research(false);
        push(&mut s, AgentId::Research, content, citations, 0.9);

        let report = evaluate(&s, &[AgentId::Research], &[]);
        assert_eq!(report.verdict, QualityVerdict::Accept);
    }

    #[test]
    fn missing_agent_with_transient_gap_is_revised() {
        let mut s = state();
        let (content, citations) = research(true);
        push(&mut s, AgentId::Research, content, citations, 0.9);
        let gaps = vec![CoverageGap {
            agent: AgentId::Compliance,
            reason: GapReason::RetriesExhausted {
                message: "timeout".to_string(),
            },
            earlier_finding_kept: false,
        }];

        let report = evaluate(&s, &[AgentId::Research, AgentId::Compliance], &gaps);

        assert_eq!(
            report.verdict,
            QualityVerdict::Revise {
                targets: vec![AgentId::Compliance]
            }
        );
        assert!(report.failures[0].message.contains("timeout"));
    }

    #[test]
    fn permanent_gaps_degrade_instead_of_revising() {
        let mut s = state();
        let (content, citations) = research(true);
        push(&mut s, AgentId::Research, content, citations, 0.9);
        push(&mut s, AgentId::LegalAnalysis, legal(ComplianceVerdict::Conditional), vec![], 0.9);
        let gaps = vec![
            CoverageGap {
                agent: AgentId::Compliance,
                reason: GapReason::PermanentFailure {
                    message: "unsupported domain".to_string(),
                },
                earlier_finding_kept: false,
            },
            CoverageGap {
                agent: AgentId::RiskAssessment,
                reason: GapReason::Blocked {
                    dependency: AgentId::Compliance,
                },
                earlier_finding_kept: false,
            },
        ];

        let report = evaluate(&s, &REQUIRED, &gaps);

        assert_eq!(report.verdict, QualityVerdict::Degrade { gaps: gaps.clone() });
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|f| !f.repairable));
    }

    #[test]
    fn contradiction_without_risk_agent_fails() {
        let mut s = state();
        let (content, citations) = research(true);
        push(&mut s, AgentId::Research, content, citations, 0.9);
        push(&mut s, AgentId::Compliance, compliance(ComplianceVerdict::Compliant), vec![], 0.9);
        push(&mut s, AgentId::LegalAnalysis, legal(ComplianceVerdict::NonCompliant), vec![], 0.9);

        let report = evaluate(
            &s,
            &[AgentId::Research, AgentId::Compliance, AgentId::LegalAnalysis],
            &[],
        );

        match report.verdict {
            QualityVerdict::Fail { contradiction } => {
                assert_eq!(contradiction, "compliance says compliant, legal_analysis says non_compliant")
            }
            other => panic!("expected fail, got {other:?}"),
        }
    }

    #[test]
    fn reconciling_risk_assessment_resolves_contradiction() {
        let mut s = state();
        let (content, citations) = research(true);
        push(&mut s, AgentId::Research, content, citations, 0.9);
        push(&mut s, AgentId::Compliance, compliance(ComplianceVerdict::Compliant), vec![], 0.9);
        push(&mut s, AgentId::LegalAnalysis, legal(ComplianceVerdict::NonCompliant), vec![], 0.9);
        push(
            &mut s,
            AgentId::RiskAssessment,
            risk(Some("technical compliance holds; legal exposure stems from pending labeling rules")),
            vec![],
            0.9,
        );

        assert_eq!(evaluate(&s, &REQUIRED, &[]).verdict, QualityVerdict::Accept);
    }

    #[test]
    fn stale_risk_assessment_is_revised() {
        let mut s = complete(0.9);
        // Legal analysis is revised after risk already ran.
        push(&mut s, AgentId::LegalAnalysis, legal(ComplianceVerdict::NonCompliant), vec![], 0.9);
        push(&mut s, AgentId::Compliance, compliance(ComplianceVerdict::Compliant), vec![], 0.9);

        let report = evaluate(&s, &REQUIRED, &[]);

        assert_eq!(
            report.verdict,
            QualityVerdict::Revise {
                targets: vec![AgentId::RiskAssessment]
            }
        );
        assert!(report.failures[0].message.contains("predates"));
    }

    #[test]
    fn fresh_risk_without_reconciliation_fails() {
        let mut s = state();
        let (content, citations) = research(true);
        push(&mut s, AgentId::Research, content, citations, 0.9);
        push(&mut s, AgentId::Compliance, compliance(ComplianceVerdict::Compliant), vec![], 0.9);
        push(&mut s, AgentId::LegalAnalysis, legal(ComplianceVerdict::NonCompliant), vec![], 0.9);
        push(&mut s, AgentId::RiskAssessment, risk(None), vec![], 0.9);

        let report = evaluate(&s, &REQUIRED, &[]);
        assert!(matches!(report.verdict, QualityVerdict::Fail { .. }));
    }

    #[test]
    fn fail_takes_precedence_over_revise() {
        let mut s = state();
        let (content, citations) = research(true);
        push(&mut s, AgentId::Research, content, citations, 0.1);
        push(&mut s, AgentId::Compliance, compliance(ComplianceVerdict::Compliant), vec![], 0.9);
        push(&mut s, AgentId::LegalAnalysis, legal(ComplianceVerdict::NonCompliant), vec![], 0.9);

        let report = evaluate(
            &s,
            &[AgentId::Research, AgentId::Compliance, AgentId::LegalAnalysis],
            &[],
        );
        assert!(matches!(report.verdict, QualityVerdict::Fail { .. }));
        assert!(report.failures.iter().any(|f| f.check == QualityCheck::Confidence));
    }

    #[test]
    fn low_confidence_lists_lowest_first_and_targets_in_priority_order() {
        let mut s = state();
        let (content, citations) = research(true);
        push(&mut s, AgentId::Research, content, citations, 0.5);
        push(&mut s, AgentId::Compliance, compliance(ComplianceVerdict::Conditional), vec![], 0.3);
        push(&mut s, AgentId::LegalAnalysis, legal(ComplianceVerdict::Conditional), vec![], 0.95);

        let report = evaluate(
            &s,
            &[AgentId::Research, AgentId::Compliance, AgentId::LegalAnalysis],
            &[],
        );

        let flagged: Vec<_> = report.failures.iter().filter_map(|f| f.agent).collect();
        assert_eq!(flagged, vec![AgentId::Compliance, AgentId::Research]);
        assert_eq!(
            report.verdict,
            QualityVerdict::Revise {
                targets: vec![AgentId::Research, AgentId::Compliance]
            }
        );
    }

    #[test]
    fn document_review_weight_does_not_drag_confidence() {
        let mut s = complete(0.9);
        push(
            &mut s,
            AgentId::DocumentReview,
            FindingContent::DocumentReview {
                summary: "formatted".to_string(),
                report: "# Report".to_string(),
            },
            vec![],
            0.0,
        );
        assert_eq!(evaluate(&s, &REQUIRED, &[]).verdict, QualityVerdict::Accept);
    }

    #[test]
    fn blank_summary_fails_structure_and_is_repairable() {
        let mut s = complete(0.9);
        push(
            &mut s,
            AgentId::Compliance,
            FindingContent::Compliance {
                summary: " ".to_string(),
                verdict: ComplianceVerdict::Conditional,
                requirements: vec![],
            },
            vec![],
            0.9,
        );

        let report = evaluate(&s, &REQUIRED, &[]);

        assert_eq!(
            report.verdict,
            QualityVerdict::Revise {
                targets: vec![AgentId::Compliance]
            }
        );
        assert!(report
            .failures
            .iter()
            .all(|f| f.check == QualityCheck::Structure && f.message.starts_with("JSON Schema violation")));
    }

    #[test]
    fn custom_schema_is_applied() {
        let strict = json!({
            "type": "object",
            "required": ["requirements"],
            "properties": { "requirements": { "type": "array", "minItems": 3 } }
        });
        let gate = RegulatoryGate::new()
            .unwrap()
            .with_schema(AgentId::Compliance, &strict)
            .unwrap();
        let s = complete(0.9);
        let criteria = criteria();

        let report = gate
            .evaluate(&GateInput {
                state: &s,
                required: &REQUIRED,
                gaps: &[],
                criteria: &criteria,
            })
            .unwrap();

        assert_eq!(
            report.verdict,
            QualityVerdict::Revise {
                targets: vec![AgentId::Compliance]
            }
        );
    }

    #[test]
    fn uncompilable_schema_is_rejected() {
        let err = RegulatoryGate::new()
            .unwrap()
            .with_schema(AgentId::Research, &json!({ "type": "not-a-type" }))
            .err()
            .unwrap();
        assert!(matches!(err, RegulaError::Schema { .. }));
        assert!(err.to_string().contains("research"));
    }

    #[test]
    fn verdict_tracks_the_floor_over_random_confidences() {
        let gate = RegulatoryGate::new().unwrap();
        for seed in 0..50u64 {
            let mut rng = fastrand::Rng::with_seed(seed);
            let mut s = state();
            let (content, citations) = research(true);
            push(&mut s, AgentId::Research, content, citations, rng.f64());
            push(&mut s, AgentId::Compliance, compliance(ComplianceVerdict::Conditional), vec![], rng.f64());
            let floor = rng.f64();
            let criteria = QualityCriteria {
                confidence_floor: floor,
                ..criteria()
            };
            let input = GateInput {
                state: &s,
                required: &[AgentId::Research, AgentId::Compliance],
                gaps: &[],
                criteria: &criteria,
            };

            let first = gate.evaluate(&input).unwrap();
            let second = gate.evaluate(&input).unwrap();

            assert_eq!(first, second, "seed {seed}: gate must be deterministic");
            let accepted = first.verdict == QualityVerdict::Accept;
            assert_eq!(accepted, first.aggregate_confidence >= floor, "seed {seed}");
        }
    }
}
