//! The REGULA orchestrator: the bounded run loop over the phase machine.
//!
//! One call to `run` drives one request through:
//!
//!   ROUTING → AWAITING_AGENTS → … → QUALITY_CHECK → FINALIZING → DONE
//!
//! The orchestrator is the only owner of the `AnalysisState`. Agents run on
//! owned views inside a `JoinSet`; their results are merged only after the
//! whole wave has settled, in priority order, so concurrent completion order
//! never leaks into `findings`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use regula_config::OrchestratorConfig;
use regula_contracts::{
    agent::AgentId,
    error::{AgentError, RegulaError, RegulaResult},
    execution::{Next, Node, TraceOutcome},
    finding::Finding,
    quality::{GateInput, QualityReport, QualityVerdict},
    request::{AnalysisOutput, AnalysisRequest, RunReport},
    state::{AnalysisState, CoverageGap, GapReason, RunStatus, TerminalCause},
};

use crate::{
    finalizer::Finalizer,
    machine::{transition, Event, Phase},
    registry::AgentRegistry,
    retry::{invoke_with_retry, Invocation, RetryPolicy},
    router::{Round, Router},
    traits::{QualityGate, RunObserver},
};

/// Why a wave stopped before every agent settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interruption {
    RunDeadline,
    Cancelled,
}

impl Interruption {
    fn cause(self) -> TerminalCause {
        match self {
            Interruption::RunDeadline => TerminalCause::RunDeadlineExceeded,
            Interruption::Cancelled => TerminalCause::Cancelled,
        }
    }
}

/// Per-run values resolved from the configuration and the request priority.
struct RunBudget {
    agent_timeout: std::time::Duration,
    run_deadline: Instant,
    max_revisions: u32,
}

/// Drives analysis requests through the agent graph.
///
/// Build one orchestrator at startup and share it; every `run` owns its
/// own state, so concurrent runs never interact.
pub struct Orchestrator {
    registry: AgentRegistry,
    gate: Box<dyn QualityGate>,
    observer: Option<Box<dyn RunObserver>>,
    config: OrchestratorConfig,
    router: Router,
    retry: RetryPolicy,
    finalizer: Finalizer,
}

impl Orchestrator {
    /// Validate `config` and `registry` and wire the orchestrator.
    pub fn new(
        registry: AgentRegistry,
        gate: Box<dyn QualityGate>,
        config: OrchestratorConfig,
    ) -> RegulaResult<Self> {
        config.validate()?;
        registry.validate()?;
        let router = Router::new(&registry.ids(), config.max_concurrent_agents);
        let retry = RetryPolicy::from(&config.retry);
        let finalizer = Finalizer::from_config(&config);
        Ok(Self {
            registry,
            gate,
            observer: None,
            config,
            router,
            retry,
            finalizer,
        })
    }

    /// Attach the sink that receives one `RunReport` per run.
    pub fn with_observer(mut self, observer: Box<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Run `request` to completion.
    pub async fn run(&self, request: AnalysisRequest) -> RegulaResult<AnalysisOutput> {
        self.run_with_cancellation(request, CancellationToken::new()).await
    }

    /// Run `request`, stopping early when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Only an invalid request, a gate error, or a broken state-machine
    /// invariant returns `Err`. Agent failures, deadlines, cancellation,
    /// exhausted budgets and contradictions all come back as an
    /// `AnalysisOutput` with the matching status.
    pub async fn run_with_cancellation(
        &self,
        request: AnalysisRequest,
        cancel: CancellationToken,
    ) -> RegulaResult<AnalysisOutput> {
        request.validate()?;

        let mut state = AnalysisState::new(&request);
        let priority = state.priority();
        let budget = RunBudget {
            agent_timeout: self.config.agent_timeout(priority),
            run_deadline: Instant::now() + self.config.run_deadline(priority),
            max_revisions: self.config.max_revisions_for(priority),
        };
        let criteria = self.config.criteria(priority);
        let required = self.registry.required();

        info!(
            run_id = %state.run_id(),
            priority = %priority,
            agents = required.len(),
            max_revisions = budget.max_revisions,
            "run started"
        );

        let mut gaps: BTreeMap<AgentId, GapReason> = BTreeMap::new();
        let mut round = Round::initial(&required);
        let mut wave: Vec<AgentId> = Vec::new();
        let mut wave_reason = String::new();
        let mut phase = Phase::Routing;

        while !phase.is_done() {
            phase = match phase {
                // ── ROUTING ───────────────────────────────────────────────
                Phase::Routing => {
                    let interruption = if cancel.is_cancelled() {
                        Some(Interruption::Cancelled)
                    } else if Instant::now() >= budget.run_deadline {
                        Some(Interruption::RunDeadline)
                    } else {
                        None
                    };
                    if let Some(interruption) = interruption {
                        self.terminate_early(&mut state, phase, interruption)?
                    } else {
                        let plan = self.router.route(&state, &round);
                        for blocked in &plan.blocked {
                            debug!(
                                run_id = %state.run_id(),
                                agent = %blocked.agent,
                                dependency = %blocked.dependency,
                                "agent blocked on failed dependency"
                            );
                            state.record(
                                Node::Agent(blocked.agent),
                                Utc::now(),
                                TraceOutcome::Skipped {
                                    dependency: blocked.dependency,
                                },
                                format!("{}: dependency {} unavailable", round.label(), blocked.dependency),
                            );
                            gaps.insert(
                                blocked.agent,
                                GapReason::Blocked {
                                    dependency: blocked.dependency,
                                },
                            );
                            round.settle(blocked.agent);
                        }
                        match plan.decision.next {
                            Next::Agent(_) | Next::Concurrent(_) => {
                                wave = plan.decision.next.agents();
                                wave_reason = plan.decision.reason;
                                transition(phase, Event::Dispatched)?
                            }
                            Next::QualityCheck => {
                                debug!(run_id = %state.run_id(), reason = %plan.decision.reason, "round complete");
                                transition(phase, Event::RoundComplete)?
                            }
                            other => {
                                return Err(RegulaError::StateMachine {
                                    reason: format!("router produced {other:?} while routing"),
                                })
                            }
                        }
                    }
                }

                // ── AWAITING_AGENTS ───────────────────────────────────────
                Phase::AwaitingAgents => {
                    let (settled, interruption) = self
                        .dispatch_wave(&mut state, &wave, &round, &wave_reason, &budget, &cancel)
                        .await?;
                    for (agent, gap) in settled {
                        round.settle(agent);
                        match gap {
                            Some(reason) => {
                                gaps.insert(agent, reason);
                            }
                            None => {
                                gaps.remove(&agent);
                            }
                        }
                    }
                    match interruption {
                        Some(interruption) => self.terminate_early(&mut state, phase, interruption)?,
                        None => transition(phase, Event::Settled)?,
                    }
                }

                // ── QUALITY_CHECK ─────────────────────────────────────────
                Phase::QualityCheck => {
                    let entered_at = Utc::now();
                    let gap_list = gap_list(&state, &gaps);
                    let report = self.gate.evaluate(&GateInput {
                        state: &state,
                        required: &required,
                        gaps: &gap_list,
                        criteria: &criteria,
                    })?;
                    info!(
                        run_id = %state.run_id(),
                        verdict = report.verdict.label(),
                        failures = report.failures.len(),
                        aggregate_confidence = report.aggregate_confidence,
                        revision_count = state.revision_count(),
                        "quality gate evaluated"
                    );
                    let next = self.apply_verdict(&mut state, &report, entered_at, &budget)?;
                    if let (Phase::Routing, QualityVerdict::Revise { targets }) = (next, &report.verdict) {
                        let targets: Vec<AgentId> =
                            targets.iter().copied().filter(|t| required.contains(t)).collect();
                        round = Round::revision(&targets, &report, state.revision_count());
                    }
                    next
                }

                // ── FINALIZING ────────────────────────────────────────────
                Phase::Finalizing => {
                    if self.registry.contains(AgentId::DocumentReview) {
                        let review = Round::review();
                        let wave = [AgentId::DocumentReview];
                        // Review only formats accepted findings; its failure
                        // never changes the verdict.
                        let (_, interruption) = self
                            .dispatch_wave(&mut state, &wave, &review, "document review", &budget, &cancel)
                            .await?;
                        if let Some(interruption) = interruption {
                            warn!(
                                run_id = %state.run_id(),
                                ?interruption,
                                "document review interrupted, finalizing without it"
                            );
                        }
                    }
                    state.conclude(RunStatus::Accepted, None)?;
                    transition(phase, Event::Finalized)?
                }

                Phase::Done(_) => phase,
            };
        }

        let gaps = gap_list(&state, &gaps);
        let output = self.finalizer.finalize(&mut state, gaps);
        self.emit(&request, &output);
        Ok(output)
    }

    /// Conclude the run as degraded after a deadline or cancellation.
    fn terminate_early(
        &self,
        state: &mut AnalysisState,
        phase: Phase,
        interruption: Interruption,
    ) -> RegulaResult<Phase> {
        warn!(
            run_id = %state.run_id(),
            phase = %phase,
            ?interruption,
            findings = state.findings().len(),
            "run terminated early"
        );
        let next = transition(phase, Event::Terminated(RunStatus::Degraded))?;
        state.conclude(RunStatus::Degraded, Some(interruption.cause()))?;
        Ok(next)
    }

    /// Record the gate outcome and move the phase machine.
    fn apply_verdict(
        &self,
        state: &mut AnalysisState,
        report: &QualityReport,
        entered_at: DateTime<Utc>,
        budget: &RunBudget,
    ) -> RegulaResult<Phase> {
        let phase = Phase::QualityCheck;
        let revision_allowed = match &report.verdict {
            QualityVerdict::Revise { .. } => state.increment_revision(budget.max_revisions),
            _ => false,
        };
        let decision = self.router.after_verdict(&report.verdict, revision_allowed);

        let outcome = match &report.verdict {
            QualityVerdict::Accept => TraceOutcome::Accepted,
            QualityVerdict::Revise { targets } => TraceOutcome::Revise {
                targets: targets.clone(),
                reasons: report.reasons(),
            },
            QualityVerdict::Degrade { gaps } => TraceOutcome::Degrade { gaps: gaps.clone() },
            QualityVerdict::Fail { contradiction } => TraceOutcome::Fail {
                contradiction: contradiction.clone(),
            },
        };
        state.record(Node::QualityCheck, entered_at, outcome, decision.reason.clone());

        match (&report.verdict, decision.next) {
            (QualityVerdict::Accept, Next::Finalize) => transition(phase, Event::Accepted),
            (QualityVerdict::Revise { .. }, Next::Agent(_) | Next::Concurrent(_)) => {
                info!(
                    run_id = %state.run_id(),
                    revision = state.revision_count(),
                    max_revisions = budget.max_revisions,
                    "revision requested"
                );
                transition(phase, Event::Revised)
            }
            (verdict, Next::Terminate(status)) => {
                let cause = match verdict {
                    QualityVerdict::Fail { contradiction } => TerminalCause::StructuralContradiction {
                        description: contradiction.clone(),
                    },
                    QualityVerdict::Degrade { .. } => TerminalCause::UnrepairableGaps,
                    _ => TerminalCause::RevisionBudgetExhausted {
                        max_revisions: budget.max_revisions,
                    },
                };
                let next = transition(phase, Event::Terminated(status))?;
                warn!(run_id = %state.run_id(), status = %status, cause = %cause, "run concluded without acceptance");
                state.conclude(status, Some(cause))?;
                Ok(next)
            }
            (verdict, next) => Err(RegulaError::StateMachine {
                reason: format!("verdict {} cannot lead to {next:?}", verdict.label()),
            }),
        }
    }

    /// Fan out `wave`, join on every agent, then merge in priority order.
    ///
    /// Returns each settled agent with its gap (None when it contributed),
    /// plus the interruption that cut the wave short, if any. Agents still
    /// running at an interruption are aborted and their work discarded.
    async fn dispatch_wave(
        &self,
        state: &mut AnalysisState,
        wave: &[AgentId],
        round: &Round,
        reason: &str,
        budget: &RunBudget,
        cancel: &CancellationToken,
    ) -> RegulaResult<(Vec<(AgentId, Option<GapReason>)>, Option<Interruption>)> {
        let entered_at = Utc::now();
        let mut join_set = JoinSet::new();

        for (slot, agent_id) in wave.iter().copied().enumerate() {
            let agent = self.registry.get(agent_id).ok_or_else(|| RegulaError::StateMachine {
                reason: format!("router dispatched unregistered agent '{agent_id}'"),
            })?;
            let view = state.view_for(agent_id, round.hints_for(agent_id), budget.run_deadline.into_std());
            let policy = self.retry.clone();
            let agent_timeout = budget.agent_timeout;
            let run_deadline = budget.run_deadline;
            debug!(run_id = %state.run_id(), agent = %agent_id, revision = view.revision, "dispatching agent");
            join_set.spawn(async move {
                let invocation =
                    invoke_with_retry(agent.as_ref(), view, &policy, agent_timeout, run_deadline).await;
                (slot, invocation)
            });
        }

        let mut results: Vec<Option<Invocation>> = vec![None; wave.len()];
        let mut interruption = None;
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    interruption = Some(Interruption::Cancelled);
                    break;
                }
                _ = tokio::time::sleep_until(budget.run_deadline) => {
                    join_set.abort_all();
                    interruption = Some(Interruption::RunDeadline);
                    break;
                }
                joined = join_set.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };
            match joined {
                Ok((slot, invocation)) => results[slot] = Some(invocation),
                Err(e) => error!(run_id = %state.run_id(), error = %e, "agent task failed to join"),
            }
        }

        let mut settled = Vec::with_capacity(wave.len());
        for (agent_id, result) in wave.iter().copied().zip(results) {
            let (outcome, gap, finding) = match result {
                Some(Invocation { result: Ok(finding), attempts }) => (
                    TraceOutcome::Contributed {
                        confidence: finding.confidence,
                        attempts,
                    },
                    None,
                    Some(finding),
                ),
                Some(Invocation { result: Err(e), attempts }) => settle_failure(e, attempts),
                None => {
                    let message = match interruption {
                        Some(Interruption::Cancelled) => "run cancelled".to_string(),
                        Some(Interruption::RunDeadline) => "run deadline exceeded".to_string(),
                        None => "agent task terminated unexpectedly".to_string(),
                    };
                    if interruption.is_some() {
                        (
                            TraceOutcome::Aborted { message: message.clone() },
                            Some(GapReason::Aborted { message }),
                            None,
                        )
                    } else {
                        (
                            TraceOutcome::PermanentFailure { message: message.clone() },
                            Some(GapReason::PermanentFailure { message }),
                            None,
                        )
                    }
                }
            };

            state.record(Node::Agent(agent_id), entered_at, outcome, reason);
            if let Some(finding) = finding {
                let (confidence, citations) = {
                    let appended = state.append_finding(finding)?;
                    (appended.confidence, appended.citations.len())
                };
                info!(
                    run_id = %state.run_id(),
                    agent = %agent_id,
                    confidence,
                    citations,
                    "finding recorded"
                );
            }
            settled.push((agent_id, gap));
        }

        Ok((settled, interruption))
    }

    fn emit(&self, request: &AnalysisRequest, output: &AnalysisOutput) {
        let Some(observer) = &self.observer else {
            return;
        };
        if let Err(e) = observer.emit(&RunReport::new(request, output)) {
            error!(run_id = %output.run_id, error = %e, "observability sink rejected run report");
        }
    }
}

fn settle_failure(error: AgentError, attempts: u32) -> (TraceOutcome, Option<GapReason>, Option<Finding>) {
    let message = error.message().to_string();
    if error.is_transient() {
        (
            TraceOutcome::RetriesExhausted {
                attempts,
                message: error.to_string(),
            },
            Some(GapReason::RetriesExhausted { message }),
            None,
        )
    } else {
        (
            TraceOutcome::PermanentFailure { message: message.clone() },
            Some(GapReason::PermanentFailure { message }),
            None,
        )
    }
}

fn gap_list(state: &AnalysisState, gaps: &BTreeMap<AgentId, GapReason>) -> Vec<CoverageGap> {
    gaps.iter()
        .map(|(agent, reason)| CoverageGap {
            agent: *agent,
            reason: reason.clone(),
            earlier_finding_kept: state.findings().iter().any(|f| f.agent_id == *agent),
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────
