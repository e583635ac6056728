//! Findings: one agent's typed contribution to an analysis.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;

/// A source reference backing a finding.
///
/// Citations are identified by `id`; two citations with the same id are the
/// same source regardless of excerpt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub url: String,
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Issuing authority, e.g. "ANVISA".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulatory_body: Option<String>,
}

impl Citation {
    pub fn new(id: impl Into<String>, url: impl Into<String>, excerpt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            excerpt: excerpt.into(),
            title: None,
            regulatory_body: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.regulatory_body = Some(body.into());
        self
    }
}

/// Drop citations whose id was already seen, keeping first-seen order.
pub fn dedup_citations<I>(citations: I) -> Vec<Citation>
where
    I: IntoIterator<Item = Citation>,
{
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}

/// A compliance position asserted by compliance or legal analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceVerdict {
    Compliant,
    NonCompliant,
    /// Compliant subject to stated conditions.
    Conditional,
    Undetermined,
}

impl ComplianceVerdict {
    /// Only an outright compliant/non-compliant pair is a contradiction;
    /// conditional and undetermined positions are compatible with either.
    pub fn contradicts(&self, other: &ComplianceVerdict) -> bool {
        matches!(
            (self, other),
            (ComplianceVerdict::Compliant, ComplianceVerdict::NonCompliant)
                | (ComplianceVerdict::NonCompliant, ComplianceVerdict::Compliant)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceVerdict::Compliant => "compliant",
            ComplianceVerdict::NonCompliant => "non_compliant",
            ComplianceVerdict::Conditional => "conditional",
            ComplianceVerdict::Undetermined => "undetermined",
        }
    }
}

/// Overall rating derived from the risk matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskRating {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskRating {
    /// Map a probability x impact score (1..=25) to a rating.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=4 => RiskRating::Low,
            5..=9 => RiskRating::Moderate,
            10..=16 => RiskRating::High,
            _ => RiskRating::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskRating::Low => "low",
            RiskRating::Moderate => "moderate",
            RiskRating::High => "high",
            RiskRating::Critical => "critical",
        }
    }
}

/// One entry of the probability x impact risk matrix (both 1..=5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub probability: u8,
    pub impact: u8,
}

impl RiskItem {
    pub fn score(&self) -> u8 {
        self.probability.saturating_mul(self.impact)
    }
}

/// Agent-specific structured output. Every variant carries a free-text
/// summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingContent {
    Research {
        summary: String,
        #[serde(default)]
        topics: Vec<String>,
        #[serde(default)]
        regulatory_bodies: Vec<String>,
    },
    Compliance {
        summary: String,
        verdict: ComplianceVerdict,
        #[serde(default)]
        requirements: Vec<String>,
    },
    LegalAnalysis {
        summary: String,
        verdict: ComplianceVerdict,
        #[serde(default)]
        frameworks: Vec<String>,
    },
    RiskAssessment {
        summary: String,
        rating: RiskRating,
        #[serde(default)]
        risks: Vec<RiskItem>,
        /// Present when the assessment explains away a verdict conflict.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reconciliation: Option<String>,
    },
    DocumentReview {
        summary: String,
        report: String,
    },
}

impl FindingContent {
    pub fn summary(&self) -> &str {
        match self {
            FindingContent::Research { summary, .. }
            | FindingContent::Compliance { summary, .. }
            | FindingContent::LegalAnalysis { summary, .. }
            | FindingContent::RiskAssessment { summary, .. }
            | FindingContent::DocumentReview { summary, .. } => summary,
        }
    }

    /// The compliance verdict asserted by this content, if any.
    pub fn verdict(&self) -> Option<ComplianceVerdict> {
        match self {
            FindingContent::Compliance { verdict, .. }
            | FindingContent::LegalAnalysis { verdict, .. } => Some(*verdict),
            _ => None,
        }
    }

    /// True when this content shape is the one `agent` is expected to emit.
    pub fn fits(&self, agent: AgentId) -> bool {
        match self {
            FindingContent::Research { .. } => agent.is_research_class(),
            FindingContent::Compliance { .. } => agent == AgentId::Compliance,
            FindingContent::LegalAnalysis { .. } => agent == AgentId::LegalAnalysis,
            FindingContent::RiskAssessment { .. } => agent == AgentId::RiskAssessment,
            FindingContent::DocumentReview { .. } => agent == AgentId::DocumentReview,
        }
    }
}

/// One agent's contribution to the shared analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub agent_id: AgentId,
    pub content: FindingContent,
    /// Source references, unique by `id`.
    pub citations: Vec<Citation>,
    /// Local confidence in [0, 1].
    pub confidence: f64,
    /// Logical sequence number assigned when the finding is appended to the
    /// analysis state. Zero until then.
    pub created_at: u64,
}

impl Finding {
    /// Build a finding. Citations are deduplicated by id and the confidence
    /// is clamped into [0, 1] (NaN becomes 0).
    pub fn new(
        agent_id: AgentId,
        content: FindingContent,
        citations: Vec<Citation>,
        confidence: f64,
    ) -> Self {
        Self {
            agent_id,
            content,
            citations: dedup_citations(citations),
            confidence: clamp_unit(confidence),
            created_at: 0,
        }
    }

    pub fn summary(&self) -> &str {
        self.content.summary()
    }
}

/// Clamp into [0, 1], mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
