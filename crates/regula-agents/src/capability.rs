//! Capability interfaces for the external collaborators agents call.
//!
//! Agents never talk to an LLM or a search backend directly. They hold a
//! `SearchProvider` and a `ReasoningProvider`, and every failure those
//! report is a `CapabilityError`, which maps onto the transient/permanent
//! split the orchestrator retries on.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use regula_contracts::{
    error::AgentError,
    finding::{Citation, ComplianceVerdict},
};

use crate::extract::ResearchStrategy;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failures reported by a capability backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    #[error("capability call timed out: {reason}")]
    Timeout { reason: String },

    #[error("capability rate limited: {reason}")]
    RateLimited { reason: String },

    #[error("capability backend unavailable: {reason}")]
    Unavailable { reason: String },

    /// The backend refused the request itself (unsupported domain, invalid
    /// input). Retrying the same request cannot help.
    #[error("capability rejected the request: {reason}")]
    Rejected { reason: String },

    #[error("capability returned a malformed response: {reason}")]
    Malformed { reason: String },
}

impl From<CapabilityError> for AgentError {
    fn from(err: CapabilityError) -> Self {
        let message = err.to_string();
        match err {
            CapabilityError::Timeout { .. } => AgentError::timeout(message),
            CapabilityError::RateLimited { .. } => AgentError::rate_limited(message),
            CapabilityError::Unavailable { .. } => AgentError::unavailable(message),
            CapabilityError::Rejected { .. } | CapabilityError::Malformed { .. } => {
                AgentError::permanent(message)
            }
        }
    }
}

// ── Search ────────────────────────────────────────────────────────────────────

/// A search request against regulatory sources.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    /// Restrict to these issuing authorities. Empty means any.
    pub bodies: Vec<String>,
    pub strategy: ResearchStrategy,
    pub max_results: usize,
    /// The caller's deadline. Providers may use it to size their own
    /// timeouts; the orchestrator enforces it regardless.
    pub deadline: Instant,
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub url: String,
    pub title: String,
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulatory_body: Option<String>,
    /// Relevance in [0, 1].
    pub relevance: f64,
}

impl SearchHit {
    pub fn citation(&self) -> Citation {
        let citation = Citation::new(&self.id, &self.url, &self.excerpt).with_title(&self.title);
        match &self.regulatory_body {
            Some(body) => citation.with_body(body),
            None => citation,
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, CapabilityError>;
}

// ── Reasoning ─────────────────────────────────────────────────────────────────

/// What an agent asks its reasoning backend to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningTask {
    /// Summarize sourced evidence into research findings.
    Synthesize,
    /// Decide a compliance verdict and list the requirements.
    AssessCompliance,
    /// Decide a legal position and name the governing frameworks.
    AnalyzeLegal,
    /// Explain how two conflicting verdicts fit together.
    ReconcileVerdicts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningRequest {
    pub task: ReasoningTask,
    pub query: String,
    pub context: Option<String>,
    /// Evidence lines, usually citation excerpts or prior summaries.
    pub evidence: Vec<String>,
    /// Why a previous attempt was sent back by quality control.
    pub hints: Vec<String>,
    pub deadline: Instant,
}

/// A reasoning backend's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reasoning {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<ComplianceVerdict>,
    /// Requirements, frameworks, or action items, depending on the task.
    #[serde(default)]
    pub items: Vec<String>,
    pub confidence: f64,
}

#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    async fn reason(&self, request: &ReasoningRequest) -> Result<Reasoning, CapabilityError>;
}
