//! Error types for the REGULA runtime.
//!
//! Two families live here. `RegulaError` covers failures of the runtime
//! itself (bad requests, bad configuration, illegal state transitions).
//! `AgentError` covers a single agent invocation and is always absorbed by
//! the orchestrator and turned into data; it never aborts a run.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The unified error type for the REGULA runtime.
#[derive(Debug, Error)]
pub enum RegulaError {
    /// The incoming analysis request is malformed (e.g. empty query).
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The orchestration state machine encountered an illegal transition,
    /// a non-monotonic status change, or a broken state invariant.
    #[error("state machine error: {reason}")]
    StateMachine { reason: String },

    /// Agent registration failed (duplicate id, unsatisfiable topology).
    #[error("agent registry error: {reason}")]
    Registry { reason: String },

    /// The observability sink could not record a run report.
    #[error("observability sink failed: {reason}")]
    Observability { reason: String },

    /// A JSON Schema document used for finding validation is invalid.
    #[error("schema error: {reason}")]
    Schema { reason: String },
}

/// Convenience alias used throughout the REGULA crates.
pub type RegulaResult<T> = Result<T, RegulaError>;

/// The retryable failure classes an agent invocation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientKind {
    /// The invocation ran past its deadline and was canceled.
    Timeout,
    /// An upstream collaborator throttled the request.
    RateLimited,
    /// An upstream collaborator was temporarily unreachable.
    Unavailable,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransientKind::Timeout => "timeout",
            TransientKind::RateLimited => "rate limited",
            TransientKind::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// The failure contract of a single agent invocation.
///
/// `Transient` failures are retried within the agent's local retry budget.
/// `Permanent` failures (malformed or unsupported query, unusable upstream
/// response) are surfaced immediately and never retried.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum AgentError {
    #[error("transient agent failure ({kind}): {message}")]
    Transient { kind: TransientKind, message: String },

    #[error("permanent agent failure: {message}")]
    Permanent { message: String },
}

impl AgentError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: TransientKind::Timeout,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: TransientKind::RateLimited,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: TransientKind::Unavailable,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// True when the failure may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, AgentError::Transient { .. })
    }

    /// The human-readable message without the class prefix.
    pub fn message(&self) -> &str {
        match self {
            AgentError::Transient { message, .. } | AgentError::Permanent { message } => message,
        }
    }
}
