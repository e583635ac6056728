//! The static routing topology and the per-step routing decision.
//!
//! Dependency edges:
//!
//! ```text
//! compliance, legal_analysis  → research (or research_coordinator when
//!                               research is not registered)
//! risk_assessment             → compliance
//! document_review             → reachable only after gate acceptance
//! ```
//!
//! Risk assessment also runs after a legal analysis pending in the same
//! round, so it always reads the newest verdicts. That edge orders work but
//! never blocks: a failed legal analysis leaves risk assessment runnable.
//!
//! Work is organized in rounds. The first round targets every required
//! agent; a revision round targets only the agents the gate named. Within a
//! round each target settles exactly once, which bounds every round.

use std::collections::{BTreeMap, BTreeSet};

use regula_contracts::{
    agent::AgentId,
    execution::{Next, RoutingDecision},
    quality::{QualityReport, QualityVerdict},
    state::{AnalysisState, RunStatus},
};

/// The targets of one analysis round and which of them have settled.
#[derive(Debug, Clone)]
pub struct Round {
    targets: BTreeSet<AgentId>,
    settled: BTreeSet<AgentId>,
    hints: BTreeMap<AgentId, Vec<String>>,
    label: String,
}

impl Round {
    /// The first round: every required agent, no hints.
    pub fn initial(required: &[AgentId]) -> Self {
        Self {
            targets: required.iter().copied().collect(),
            settled: BTreeSet::new(),
            hints: BTreeMap::new(),
            label: "initial analysis".to_string(),
        }
    }

    /// A revision round re-invoking `targets` with the gate's hints.
    pub fn revision(targets: &[AgentId], report: &QualityReport, revision: u32) -> Self {
        Self {
            targets: targets.iter().copied().collect(),
            settled: BTreeSet::new(),
            hints: targets
                .iter()
                .map(|agent| (*agent, report.hints_for(*agent)))
                .collect(),
            label: format!("revision {revision}"),
        }
    }

    /// The single-agent round that runs document review after acceptance.
    pub fn review() -> Self {
        Self {
            targets: BTreeSet::from([AgentId::DocumentReview]),
            settled: BTreeSet::new(),
            hints: BTreeMap::new(),
            label: "document review".to_string(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_pending(&self, agent: AgentId) -> bool {
        self.targets.contains(&agent) && !self.settled.contains(&agent)
    }

    pub fn settle(&mut self, agent: AgentId) {
        self.settled.insert(agent);
    }

    pub fn hints_for(&self, agent: AgentId) -> Vec<String> {
        self.hints.get(&agent).cloned().unwrap_or_default()
    }
}

/// An agent that cannot run this round because `dependency` settled
/// without ever contributing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blocked {
    pub agent: AgentId,
    pub dependency: AgentId,
}

/// What the router decided at one `ROUTING` step.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    pub decision: RoutingDecision,
    /// Agents to settle as skipped before acting on `decision`.
    pub blocked: Vec<Blocked>,
}

/// Pure routing over the registered agent set.
#[derive(Debug, Clone)]
pub struct Router {
    registered: BTreeSet<AgentId>,
    max_concurrent: usize,
}

impl Router {
    pub fn new(registered: &[AgentId], max_concurrent: usize) -> Self {
        Self {
            registered: registered.iter().copied().collect(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Registered agents `agent` must wait for.
    pub fn dependencies(&self, agent: AgentId) -> Vec<AgentId> {
        let dep = match agent {
            AgentId::Compliance | AgentId::LegalAnalysis => {
                if self.registered.contains(&AgentId::Research) {
                    Some(AgentId::Research)
                } else if self.registered.contains(&AgentId::ResearchCoordinator) {
                    Some(AgentId::ResearchCoordinator)
                } else {
                    None
                }
            }
            AgentId::RiskAssessment => Some(AgentId::Compliance).filter(|c| self.registered.contains(c)),
            _ => None,
        };
        dep.into_iter().collect()
    }

    /// Agents `agent` must follow when both are pending in one round.
    pub fn ordering(&self, agent: AgentId) -> Vec<AgentId> {
        let after = match agent {
            AgentId::RiskAssessment => Some(AgentId::LegalAnalysis).filter(|l| self.registered.contains(l)),
            _ => None,
        };
        after.into_iter().collect()
    }

    /// Decide the next step of `round`.
    ///
    /// Pending targets are scanned in priority order. Dependencies always
    /// rank above their dependents, so a single pass sees every blocked
    /// dependency before the agents waiting on it.
    pub fn route(&self, state: &AnalysisState, round: &Round) -> RoutePlan {
        let mut blocked: Vec<Blocked> = Vec::new();
        let mut runnable = Vec::new();

        for agent in round.targets.iter().copied().filter(|a| round.is_pending(*a)) {
            let deps = self.dependencies(agent);
            let dead = deps.iter().copied().find(|dep| {
                let settled = !round.is_pending(*dep) || blocked.iter().any(|b| b.agent == *dep);
                settled && !state.has_contributed(*dep)
            });
            if let Some(dependency) = dead {
                blocked.push(Blocked { agent, dependency });
                continue;
            }
            let ready = deps
                .iter()
                .all(|dep| !round.is_pending(*dep) && state.has_contributed(*dep));
            let waiting = self
                .ordering(agent)
                .iter()
                .any(|o| round.is_pending(*o) && !blocked.iter().any(|b| b.agent == *o));
            if ready && !waiting {
                runnable.push(agent);
            }
        }

        runnable.truncate(self.max_concurrent);
        let decision = match Next::dispatch(runnable) {
            Some(next) => {
                let names = next
                    .agents()
                    .iter()
                    .map(AgentId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                RoutingDecision::new(next, format!("{}: dispatch {}", round.label, names))
            }
            None => RoutingDecision::new(
                Next::QualityCheck,
                format!("{}: all targets settled", round.label),
            ),
        };
        RoutePlan { decision, blocked }
    }

    /// Map a gate verdict to the next step. `revision_allowed` is false once
    /// the revision ceiling is reached.
    pub fn after_verdict(&self, verdict: &QualityVerdict, revision_allowed: bool) -> RoutingDecision {
        match verdict {
            QualityVerdict::Accept => RoutingDecision::new(Next::Finalize, "quality gate accepted"),
            QualityVerdict::Revise { targets } if revision_allowed => {
                match Next::dispatch(targets.clone()) {
                    Some(next) => RoutingDecision::new(next, "quality gate requested revision"),
                    None => RoutingDecision::new(
                        Next::Terminate(RunStatus::Degraded),
                        "revision requested without targets",
                    ),
                }
            }
            QualityVerdict::Revise { .. } => RoutingDecision::new(
                Next::Terminate(RunStatus::Degraded),
                "revision budget exhausted",
            ),
            QualityVerdict::Degrade { .. } => RoutingDecision::new(
                Next::Terminate(RunStatus::Degraded),
                "only unrepairable gaps remain",
            ),
            QualityVerdict::Fail { contradiction } => RoutingDecision::new(
                Next::Terminate(RunStatus::Failed),
                format!("structural contradiction: {contradiction}"),
            ),
        }
    }
}
