//! The orchestration phase machine.
//!
//! ```text
//!            ┌──────── Settled ────────┐
//!            ▼                         │
//!        ROUTING ── Dispatched ──► AWAITING_AGENTS
//!          │  ▲                        │
//!          │  └─ Revised ─┐            └─ Terminated(degraded) ─► DONE
//!  RoundComplete          │
//!          ▼              │
//!     QUALITY_CHECK ──────┘── Terminated(degraded|failed) ──► DONE
//!          │
//!       Accepted
//!          ▼
//!      FINALIZING ── Finalized ──► DONE(accepted)
//! ```
//!
//! `transition` is total: every (phase, event) pair either yields the next
//! phase or a `StateMachine` error.

use std::fmt;

use serde::{Deserialize, Serialize};

use regula_contracts::{
    error::{RegulaError, RegulaResult},
    state::RunStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Routing,
    AwaitingAgents,
    QualityCheck,
    Finalizing,
    Done(RunStatus),
}

impl Phase {
    pub fn is_done(&self) -> bool {
        matches!(self, Phase::Done(_))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Routing => f.write_str("ROUTING"),
            Phase::AwaitingAgents => f.write_str("AWAITING_AGENTS"),
            Phase::QualityCheck => f.write_str("QUALITY_CHECK"),
            Phase::Finalizing => f.write_str("FINALIZING"),
            Phase::Done(status) => write!(f, "DONE({status})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// The router named one or more agents.
    Dispatched,
    /// Every dispatched agent settled.
    Settled,
    /// The current round has no runnable targets left.
    RoundComplete,
    Accepted,
    /// The gate asked for a revision and the budget allows it.
    Revised,
    /// Deadline, cancellation, exhausted budget, unrepairable gaps, or a
    /// structural contradiction.
    Terminated(RunStatus),
    Finalized,
}

/// The total transition function.
pub fn transition(phase: Phase, event: Event) -> RegulaResult<Phase> {
    use Event::*;
    use Phase::*;

    let next = match (phase, event) {
        (Routing, Dispatched) => AwaitingAgents,
        (Routing, RoundComplete) => QualityCheck,
        (AwaitingAgents, Settled) => Routing,
        (Routing | AwaitingAgents, Terminated(RunStatus::Degraded)) => Done(RunStatus::Degraded),
        (QualityCheck, Accepted) => Finalizing,
        (QualityCheck, Revised) => Routing,
        (QualityCheck, Terminated(status @ (RunStatus::Degraded | RunStatus::Failed))) => Done(status),
        (Finalizing, Finalized) => Done(RunStatus::Accepted),
        (phase, event) => {
            return Err(RegulaError::StateMachine {
                reason: format!("no transition from {phase} on {event:?}"),
            })
        }
    };
    Ok(next)
}
