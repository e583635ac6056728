//! Orchestrator configuration schema.
//!
//! Every field has a default, so an empty TOML document yields the stock
//! configuration. Example:
//!
//! ```toml
//! max_revisions = 4
//! max_concurrent_agents = 2
//!
//! [retry]
//! max_retries = 3
//! initial_backoff_ms = 100
//!
//! [weights]
//! risk_assessment = 0.5
//!
//! [budgets.critical]
//! agent_timeout_ms = 20000
//! run_deadline_ms = 120000
//! confidence_floor = 0.85
//! max_revisions = 2
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use regula_contracts::{
    error::{RegulaError, RegulaResult},
    quality::{AgentWeights, QualityCriteria},
    request::Priority,
};

/// Time and quality budget for one priority level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityBudget {
    /// Deadline for a single agent attempt.
    pub agent_timeout_ms: u64,
    /// Deadline for the whole run, measured from its start.
    pub run_deadline_ms: u64,
    /// Minimum weighted confidence the gate accepts.
    pub confidence_floor: f64,
    /// Overrides the global revision ceiling for this priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_revisions: Option<u32>,
}

impl PriorityBudget {
    fn new(agent_timeout_secs: u64, run_deadline_secs: u64, confidence_floor: f64) -> Self {
        Self {
            agent_timeout_ms: agent_timeout_secs * 1000,
            run_deadline_ms: run_deadline_secs * 1000,
            confidence_floor,
            max_revisions: None,
        }
    }
}

/// One budget per priority. Missing tables fall back to the stock values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityBudgets {
    pub low: PriorityBudget,
    pub medium: PriorityBudget,
    pub high: PriorityBudget,
    pub critical: PriorityBudget,
}

impl Default for PriorityBudgets {
    fn default() -> Self {
        Self {
            low: PriorityBudget::new(120, 600, 0.60),
            medium: PriorityBudget::new(90, 480, 0.65),
            high: PriorityBudget::new(60, 300, 0.70),
            // Critical requests trade per-agent time for overall SLA.
            critical: PriorityBudget::new(30, 180, 0.80),
        }
    }
}

impl PriorityBudgets {
    pub fn get(&self, priority: Priority) -> &PriorityBudget {
        match priority {
            Priority::Low => &self.low,
            Priority::Medium => &self.medium,
            Priority::High => &self.high,
            Priority::Critical => &self.critical,
        }
    }
}

/// Retry schedule for transient agent failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 250,
            max_backoff_ms: 4000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Ceiling on quality-control loop-backs per run.
    pub max_revisions: u32,
    /// Confidence deducted from the final score per revision.
    pub revision_penalty: f64,
    /// Width cap on a concurrent dispatch wave.
    pub max_concurrent_agents: usize,
    /// Research citations required once compliance or legal analysis has
    /// contributed.
    pub min_research_citations: usize,
    pub retry: RetrySettings,
    pub weights: AgentWeights,
    pub budgets: PriorityBudgets,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_revisions: 10,
            revision_penalty: 0.05,
            max_concurrent_agents: 3,
            min_research_citations: 1,
            retry: RetrySettings::default(),
            weights: AgentWeights::default(),
            budgets: PriorityBudgets::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `RegulaError::Config` if the TOML is malformed, does not
    /// match the schema, or fails validation.
    pub fn from_toml_str(s: &str) -> RegulaResult<Self> {
        let config: OrchestratorConfig = toml::from_str(s).map_err(|e| RegulaError::Config {
            reason: format!("failed to parse orchestrator TOML: {}", e),
        })?;
        config.validate()?;
        debug!(
            max_revisions = config.max_revisions,
            max_concurrent_agents = config.max_concurrent_agents,
            "orchestrator configuration loaded"
        );
        Ok(config)
    }

    /// Read the file at `path` and parse it as orchestrator configuration.
    pub fn from_file(path: &Path) -> RegulaResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| RegulaError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject values the orchestrator cannot run with.
    pub fn validate(&self) -> RegulaResult<()> {
        let fail = |reason: String| Err(RegulaError::Config { reason });

        if !(0.0..=1.0).contains(&self.revision_penalty) {
            return fail(format!(
                "revision_penalty must be within [0, 1], got {}",
                self.revision_penalty
            ));
        }
        if self.max_concurrent_agents == 0 {
            return fail("max_concurrent_agents must be at least 1".to_string());
        }
        if self.retry.backoff_multiplier.is_nan() || self.retry.backoff_multiplier < 1.0 {
            return fail(format!(
                "retry.backoff_multiplier must be >= 1, got {}",
                self.retry.backoff_multiplier
            ));
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return fail("retry.max_backoff_ms must not be below retry.initial_backoff_ms".to_string());
        }
        let weights = &self.weights;
        for (name, w) in [
            ("research_coordinator", weights.research_coordinator),
            ("research", weights.research),
            ("compliance", weights.compliance),
            ("legal_analysis", weights.legal_analysis),
            ("risk_assessment", weights.risk_assessment),
            ("document_review", weights.document_review),
        ] {
            if w.is_nan() || w < 0.0 {
                return fail(format!("weights.{name} must be non-negative, got {w}"));
            }
        }
        for priority in Priority::ALL {
            let b = self.budgets.get(priority);
            if b.agent_timeout_ms == 0 || b.run_deadline_ms == 0 {
                return fail(format!("budgets.{priority}: timeouts must be positive"));
            }
            if b.agent_timeout_ms > b.run_deadline_ms {
                return fail(format!(
                    "budgets.{priority}: agent_timeout_ms ({}) exceeds run_deadline_ms ({})",
                    b.agent_timeout_ms, b.run_deadline_ms
                ));
            }
            if !(0.0..=1.0).contains(&b.confidence_floor) {
                return fail(format!(
                    "budgets.{priority}: confidence_floor must be within [0, 1], got {}",
                    b.confidence_floor
                ));
            }
        }
        Ok(())
    }

    pub fn budget(&self, priority: Priority) -> &PriorityBudget {
        self.budgets.get(priority)
    }

    pub fn agent_timeout(&self, priority: Priority) -> Duration {
        Duration::from_millis(self.budget(priority).agent_timeout_ms)
    }

    pub fn run_deadline(&self, priority: Priority) -> Duration {
        Duration::from_millis(self.budget(priority).run_deadline_ms)
    }

    /// The revision ceiling for `priority`, honoring per-priority overrides.
    pub fn max_revisions_for(&self, priority: Priority) -> u32 {
        self.budget(priority).max_revisions.unwrap_or(self.max_revisions)
    }

    /// The gate thresholds for `priority`.
    pub fn criteria(&self, priority: Priority) -> QualityCriteria {
        QualityCriteria {
            confidence_floor: self.budget(priority).confidence_floor,
            weights: self.weights.clone(),
            min_research_citations: self.min_research_citations,
        }
    }
}
