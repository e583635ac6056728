//! Explicit retry policy for a single agent invocation.
//!
//! Retries are local to one dispatch: they never re-enter routing and never
//! touch the revision budget. Every attempt is bounded by the earlier of the
//! per-agent timeout and the run deadline, and a backoff that would sleep
//! past the run deadline ends the invocation instead.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use regula_config::RetrySettings;
use regula_contracts::{agent::AgentView, error::AgentError, finding::Finding};

use crate::traits::Agent;

/// Exponential backoff schedule for transient failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            multiplier: settings.backoff_multiplier,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(retry as i32);
        let capped = base.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// The settled result of one dispatch, after retries.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub result: Result<Finding, AgentError>,
    pub attempts: u32,
}

/// Invoke `agent` under `policy`.
///
/// `view.deadline` is rewritten per attempt. A finding attributed to an id
/// other than `view.agent` is a permanent failure.
pub async fn invoke_with_retry(
    agent: &dyn Agent,
    view: AgentView,
    policy: &RetryPolicy,
    agent_timeout: Duration,
    run_deadline: Instant,
) -> Invocation {
    let expected = view.agent;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let attempt_deadline = (Instant::now() + agent_timeout).min(run_deadline);
        let mut attempt_view = view.clone();
        attempt_view.deadline = attempt_deadline.into_std();

        debug!(
            run_id = %view.run_id,
            agent = %expected,
            attempt = attempts,
            "invoking agent"
        );

        let result = match tokio::time::timeout_at(attempt_deadline, agent.invoke(attempt_view)).await {
            Ok(Ok(finding)) if finding.agent_id != expected => Err(AgentError::permanent(format!(
                "agent '{expected}' returned a finding attributed to '{}'",
                finding.agent_id
            ))),
            Ok(result) => result,
            Err(_) => Err(AgentError::timeout(format!(
                "no response within {} ms",
                agent_timeout.as_millis()
            ))),
        };

        let error = match result {
            Ok(finding) => return Invocation { result: Ok(finding), attempts },
            Err(e) if !e.is_transient() => {
                return Invocation { result: Err(e), attempts };
            }
            Err(e) => e,
        };

        if attempts >= policy.max_attempts() {
            warn!(
                run_id = %view.run_id,
                agent = %expected,
                attempts,
                error = %error,
                "agent retries exhausted"
            );
            return Invocation { result: Err(error), attempts };
        }

        let delay = policy.backoff(attempts - 1);
        let resume_at = Instant::now() + delay;
        if resume_at >= run_deadline {
            warn!(
                run_id = %view.run_id,
                agent = %expected,
                attempts,
                "backoff would pass the run deadline, giving up"
            );
            return Invocation { result: Err(error), attempts };
        }

        warn!(
            run_id = %view.run_id,
            agent = %expected,
            attempt = attempts,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "retrying agent after transient failure"
        );
        tokio::time::sleep_until(resume_at).await;
    }
}
