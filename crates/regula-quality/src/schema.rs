//! JSON Schema documents for each agent's finding content.
//!
//! Content is validated in its serialized form (`{"kind": ..., ...}`), so a
//! schema constrains exactly what an observer or a persisted report sees.

use serde_json::{json, Value};

use regula_contracts::agent::AgentId;

const VERDICTS: [&str; 4] = ["compliant", "non_compliant", "conditional", "undetermined"];

fn non_empty_string() -> Value {
    json!({ "type": "string", "minLength": 1, "pattern": "\\S" })
}

fn string_list() -> Value {
    json!({ "type": "array", "items": { "type": "string", "minLength": 1 } })
}

/// The built-in content schema for `agent`.
pub fn default_schema(agent: AgentId) -> Value {
    match agent {
        AgentId::ResearchCoordinator | AgentId::Research => json!({
            "type": "object",
            "required": ["kind", "summary"],
            "properties": {
                "kind": { "const": "research" },
                "summary": non_empty_string(),
                "topics": string_list(),
                "regulatory_bodies": string_list()
            }
        }),
        AgentId::Compliance => json!({
            "type": "object",
            "required": ["kind", "summary", "verdict"],
            "properties": {
                "kind": { "const": "compliance" },
                "summary": non_empty_string(),
                "verdict": { "enum": VERDICTS },
                "requirements": string_list()
            }
        }),
        AgentId::LegalAnalysis => json!({
            "type": "object",
            "required": ["kind", "summary", "verdict"],
            "properties": {
                "kind": { "const": "legal_analysis" },
                "summary": non_empty_string(),
                "verdict": { "enum": VERDICTS },
                "frameworks": string_list()
            }
        }),
        AgentId::RiskAssessment => json!({
            "type": "object",
            "required": ["kind", "summary", "rating"],
            "properties": {
                "kind": { "const": "risk_assessment" },
                "summary": non_empty_string(),
                "rating": { "enum": ["low", "moderate", "high", "critical"] },
                "risks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["id", "name", "category", "probability", "impact"],
                        "properties": {
                            "id": { "type": "string", "minLength": 1 },
                            "probability": { "type": "integer", "minimum": 1, "maximum": 5 },
                            "impact": { "type": "integer", "minimum": 1, "maximum": 5 }
                        }
                    }
                },
                "reconciliation": non_empty_string()
            }
        }),
        AgentId::DocumentReview => json!({
            "type": "object",
            "required": ["kind", "summary", "report"],
            "properties": {
                "kind": { "const": "document_review" },
                "summary": non_empty_string(),
                "report": non_empty_string()
            }
        }),
    }
}
