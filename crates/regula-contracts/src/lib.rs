//! # regula-contracts
//!
//! Shared types, state records, and contracts for the REGULA regulatory
//! analysis runtime.
//!
//! Every crate in the workspace imports from here. Only data definitions,
//! error types, and the invariant-preserving mutators of `AnalysisState`
//! live in this crate.

pub mod agent;
pub mod error;
pub mod execution;
pub mod finding;
pub mod quality;
pub mod request;
pub mod state;

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Instant;

    use chrono::Utc;

    use super::*;
    use agent::AgentId;
    use error::{AgentError, RegulaError};
    use execution::{Next, Node, TraceOutcome};
    use finding::{dedup_citations, Citation, ComplianceVerdict, Finding, FindingContent, RiskRating};
    use quality::{weighted_confidence, AgentWeights, GateInput, QualityCriteria};
    use request::{AnalysisRequest, Priority};
    use state::{AnalysisState, CoverageGap, GapReason, RunStatus, TerminalCause};

    fn research_finding(citations: Vec<Citation>, confidence: f64) -> Finding {
        Finding::new(
            AgentId::Research,
            FindingContent::Research {
                summary: "RDC 751/2022 governs device registration".to_string(),
                topics: vec!["medical_devices".to_string()],
                regulatory_bodies: vec!["ANVISA".to_string()],
            },
            citations,
            confidence,
        )
    }

    fn compliance_finding(verdict: ComplianceVerdict, confidence: f64) -> Finding {
        Finding::new(
            AgentId::Compliance,
            FindingContent::Compliance {
                summary: "Class II devices require notification".to_string(),
                verdict,
                requirements: vec![],
            },
            vec![],
            confidence,
        )
    }

    fn dispatched(state: &mut AnalysisState, agent: AgentId) {
        state.record(
            Node::Agent(agent),
            Utc::now(),
            TraceOutcome::Contributed {
                confidence: 0.9,
                attempts: 1,
            },
            "test dispatch",
        );
    }

    // ── AgentId ──────────────────────────────────────────────────────────────

    #[test]
    fn agent_id_order_is_routing_priority() {
        let mut ids = vec![
            AgentId::DocumentReview,
            AgentId::Compliance,
            AgentId::Research,
            AgentId::RiskAssessment,
            AgentId::ResearchCoordinator,
            AgentId::LegalAnalysis,
        ];
        ids.sort();
        assert_eq!(ids, AgentId::ALL.to_vec());
    }

    #[test]
    fn agent_id_serializes_snake_case() {
        let json = serde_json::to_string(&AgentId::LegalAnalysis).unwrap();
        assert_eq!(json, "\"legal_analysis\"");
        let decoded: AgentId = serde_json::from_str("\"research_coordinator\"").unwrap();
        assert_eq!(decoded, AgentId::ResearchCoordinator);
    }

    #[test]
    fn only_research_class_agents_skip_prior_findings() {
        assert!(!AgentId::Research.reads_prior_findings());
        assert!(!AgentId::ResearchCoordinator.reads_prior_findings());
        assert!(AgentId::Compliance.reads_prior_findings());
        assert!(!AgentId::DocumentReview.asserts_facts());
    }

    // ── Request validation ───────────────────────────────────────────────────

    #[test]
    fn empty_query_is_rejected() {
        let err = AnalysisRequest::new("   ", Priority::High).validate().unwrap_err();
        assert!(matches!(err, RegulaError::InvalidRequest { .. }));
    }

    #[test]
    fn array_context_is_rejected_but_text_and_object_pass() {
        let base = AnalysisRequest::new("ANVISA registration", Priority::Low);
        assert!(base.clone().with_context(serde_json::json!("note")).validate().is_ok());
        assert!(base
            .clone()
            .with_context(serde_json::json!({"product": "glucose meter"}))
            .validate()
            .is_ok());
        assert!(base.with_context(serde_json::json!([1, 2])).validate().is_err());
    }

    #[test]
    fn priority_defaults_to_medium_when_absent() {
        let req: AnalysisRequest = serde_json::from_str(r#"{"query": "LGPD"}"#).unwrap();
        assert_eq!(req.priority, Priority::Medium);
        assert!(req.context.is_none());
    }

    // ── Findings and citations ───────────────────────────────────────────────

    #[test]
    fn finding_new_clamps_confidence_and_dedups_citations() {
        let c = Citation::new("rdc-751", "https://anvisa.gov.br/rdc751", "Art. 1");
        let f = research_finding(vec![c.clone(), c.clone()], 1.7);
        assert_eq!(f.confidence, 1.0);
        assert_eq!(f.citations.len(), 1);

        let nan = research_finding(vec![], f64::NAN);
        assert_eq!(nan.confidence, 0.0);
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        let out = dedup_citations(vec![
            Citation::new("b", "u", "first b"),
            Citation::new("a", "u", "a"),
            Citation::new("b", "u", "second b"),
        ]);
        let ids: Vec<&str> = out.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(out[0].excerpt, "first b");
    }

    #[test]
    fn only_compliant_versus_non_compliant_contradicts() {
        use ComplianceVerdict::*;
        assert!(Compliant.contradicts(&NonCompliant));
        assert!(NonCompliant.contradicts(&Compliant));
        assert!(!Compliant.contradicts(&Conditional));
        assert!(!Undetermined.contradicts(&NonCompliant));
    }

    #[test]
    fn risk_rating_thresholds() {
        assert_eq!(RiskRating::from_score(4), RiskRating::Low);
        assert_eq!(RiskRating::from_score(9), RiskRating::Moderate);
        assert_eq!(RiskRating::from_score(16), RiskRating::High);
        assert_eq!(RiskRating::from_score(25), RiskRating::Critical);
    }

    #[test]
    fn finding_content_serializes_with_kind_tag() {
        let f = compliance_finding(ComplianceVerdict::NonCompliant, 0.8);
        let json = serde_json::to_value(&f.content).unwrap();
        assert_eq!(json["kind"], "compliance");
        assert_eq!(json["verdict"], "non_compliant");
        assert!(f.content.fits(AgentId::Compliance));
        assert!(!f.content.fits(AgentId::LegalAnalysis));
    }

    // ── AnalysisState invariants ─────────────────────────────────────────────

    #[test]
    fn append_requires_prior_dispatch_in_trace() {
        let mut state = AnalysisState::new(&AnalysisRequest::new("q", Priority::High));
        let err = state.append_finding(research_finding(vec![], 0.9)).unwrap_err();
        assert!(matches!(err, RegulaError::StateMachine { .. }));

        dispatched(&mut state, AgentId::Research);
        assert!(state.append_finding(research_finding(vec![], 0.9)).is_ok());
        assert_eq!(state.findings().len(), 1);
    }

    #[test]
    fn created_at_is_monotonic_and_shared_with_trace() {
        let mut state = AnalysisState::new(&AnalysisRequest::new("q", Priority::High));
        dispatched(&mut state, AgentId::Research);
        dispatched(&mut state, AgentId::Compliance);
        let a = state.append_finding(research_finding(vec![], 0.9)).unwrap().created_at;
        let b = state
            .append_finding(compliance_finding(ComplianceVerdict::Compliant, 0.9))
            .unwrap()
            .created_at;
        assert!(a < b);
        assert!(state.trace().iter().all(|e| e.seq < a));
    }

    #[test]
    fn append_normalizes_hand_built_findings() {
        let mut state = AnalysisState::new(&AnalysisRequest::new("q", Priority::High));
        dispatched(&mut state, AgentId::Research);
        let mut finding = research_finding(vec![], 0.9);
        finding.confidence = 1.7;
        finding.citations = vec![
            Citation::new("rdc-751-2022", "u1", "first"),
            Citation::new("lei-6360-1976", "u2", "e"),
            Citation::new("rdc-751-2022", "u1", "second"),
        ];

        let appended = state.append_finding(finding).unwrap();
        assert_eq!(appended.confidence, 1.0);
        let ids: Vec<_> = appended.citations.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["rdc-751-2022", "lei-6360-1976"]);
        assert_eq!(appended.citations[0].excerpt, "first");

        dispatched(&mut state, AgentId::Compliance);
        let mut negative = compliance_finding(ComplianceVerdict::Compliant, 0.5);
        negative.confidence = -0.2;
        assert_eq!(state.append_finding(negative).unwrap().confidence, 0.0);
    }

    #[test]
    fn gap_display_notes_a_kept_finding() {
        let mut gap = CoverageGap {
            agent: AgentId::Compliance,
            reason: GapReason::RetriesExhausted {
                message: "timeout".to_string(),
            },
            earlier_finding_kept: false,
        };
        assert_eq!(gap.to_string(), "compliance: retries exhausted: timeout");
        gap.earlier_finding_kept = true;
        assert!(gap.to_string().ends_with("(revision failed, earlier finding kept)"));

        let legacy: CoverageGap = serde_json::from_value(serde_json::json!({
            "agent": "compliance",
            "reason": {"type": "blocked", "dependency": "research"},
        }))
        .unwrap();
        assert!(!legacy.earlier_finding_kept);
    }

    #[test]
    fn revision_count_never_passes_ceiling() {
        let mut state = AnalysisState::new(&AnalysisRequest::new("q", Priority::Low));
        assert!(state.increment_revision(2));
        assert!(state.increment_revision(2));
        assert!(!state.increment_revision(2));
        assert_eq!(state.revision_count(), 2);
        assert!(!state.increment_revision(0));
    }

    #[test]
    fn status_is_monotonic() {
        let mut state = AnalysisState::new(&AnalysisRequest::new("q", Priority::Low));
        assert!(state.conclude(RunStatus::InProgress, None).is_err());
        state
            .conclude(RunStatus::Degraded, Some(TerminalCause::RunDeadlineExceeded))
            .unwrap();
        assert!(state.conclude(RunStatus::Accepted, None).is_err());
        assert_eq!(state.status(), RunStatus::Degraded);
        assert_eq!(state.cause(), Some(&TerminalCause::RunDeadlineExceeded));
    }

    #[test]
    fn terminal_state_rejects_new_findings() {
        let mut state = AnalysisState::new(&AnalysisRequest::new("q", Priority::Low));
        dispatched(&mut state, AgentId::Research);
        state.conclude(RunStatus::Failed, None).unwrap();
        assert!(state.append_finding(research_finding(vec![], 0.5)).is_err());
    }

    #[test]
    fn latest_finding_supersedes_without_rewriting_history() {
        let mut state = AnalysisState::new(&AnalysisRequest::new("q", Priority::Low));
        dispatched(&mut state, AgentId::Research);
        state.append_finding(research_finding(vec![], 0.3)).unwrap();
        state.append_finding(research_finding(vec![], 0.95)).unwrap();

        let latest = state.latest_findings();
        assert_eq!(latest[&AgentId::Research].confidence, 0.95);
        assert_eq!(state.findings().len(), 2);
    }

    #[test]
    fn research_view_hides_prior_findings() {
        let mut state = AnalysisState::new(&AnalysisRequest::new("q", Priority::Low));
        dispatched(&mut state, AgentId::Research);
        state.append_finding(research_finding(vec![], 0.9)).unwrap();

        let deadline = Instant::now();
        assert!(state
            .view_for(AgentId::ResearchCoordinator, vec![], deadline)
            .prior_findings
            .is_empty());
        let view = state.view_for(AgentId::Compliance, vec!["hint".to_string()], deadline);
        assert_eq!(view.prior_findings.len(), 1);
        assert_eq!(view.revision_hints, vec!["hint".to_string()]);
    }

    // ── Routing decisions ────────────────────────────────────────────────────

    #[test]
    fn dispatch_sorts_and_collapses_single_agent() {
        assert_eq!(Next::dispatch(vec![]), None);
        assert_eq!(
            Next::dispatch(vec![AgentId::Compliance]),
            Some(Next::Agent(AgentId::Compliance))
        );
        assert_eq!(
            Next::dispatch(vec![AgentId::LegalAnalysis, AgentId::Compliance]),
            Some(Next::Concurrent(vec![AgentId::Compliance, AgentId::LegalAnalysis]))
        );
    }

    // ── Quality helpers ──────────────────────────────────────────────────────

    #[test]
    fn weighted_confidence_ignores_zero_weight_agents() {
        let r = research_finding(vec![], 0.8);
        let c = compliance_finding(ComplianceVerdict::Compliant, 0.6);
        let d = Finding::new(
            AgentId::DocumentReview,
            FindingContent::DocumentReview {
                summary: "report".to_string(),
                report: "# Report".to_string(),
            },
            vec![],
            0.0,
        );
        let mut latest = BTreeMap::new();
        latest.insert(AgentId::Research, &r);
        latest.insert(AgentId::Compliance, &c);
        latest.insert(AgentId::DocumentReview, &d);

        let mean = weighted_confidence(&latest, &AgentWeights::default());
        assert!((mean - 0.7).abs() < 1e-9);
        assert_eq!(weighted_confidence(&BTreeMap::new(), &AgentWeights::default()), 0.0);
    }

    #[test]
    fn blocked_behind_permanent_failure_cannot_be_revised() {
        let state = AnalysisState::new(&AnalysisRequest::new("q", Priority::Low));
        let gaps = vec![
            CoverageGap {
                agent: AgentId::Compliance,
                reason: GapReason::PermanentFailure {
                    message: "unsupported".to_string(),
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
            CoverageGap {
                agent: AgentId::LegalAnalysis,
                reason: GapReason::RetriesExhausted {
                    message: "timeout".to_string(),
                },
                earlier_finding_kept: false,
            },
        ];
        let required = vec![
            AgentId::Research,
            AgentId::Compliance,
            AgentId::LegalAnalysis,
            AgentId::RiskAssessment,
        ];
        let criteria = QualityCriteria {
            confidence_floor: 0.7,
            weights: AgentWeights::default(),
            min_research_citations: 1,
        };
        let input = GateInput {
            state: &state,
            required: &required,
            gaps: &gaps,
            criteria: &criteria,
        };
        assert!(!input.can_revise(AgentId::Compliance));
        assert!(!input.can_revise(AgentId::RiskAssessment));
        assert!(input.can_revise(AgentId::LegalAnalysis));
        assert!(!input.can_revise(AgentId::DocumentReview));
    }

    // ── Error display ────────────────────────────────────────────────────────

    #[test]
    fn agent_error_classes() {
        assert!(AgentError::timeout("30s elapsed").is_transient());
        assert!(AgentError::rate_limited("429").is_transient());
        let perm = AgentError::permanent("unsupported domain");
        assert!(!perm.is_transient());
        assert_eq!(perm.message(), "unsupported domain");
        assert!(perm.to_string().contains("permanent agent failure"));
    }

    #[test]
    fn error_state_machine_display() {
        let err = RegulaError::StateMachine {
            reason: "illegal transition".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("state machine error"));
        assert!(msg.contains("illegal transition"));
    }
}
