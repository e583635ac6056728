//! # regula-agents
//!
//! The specialized agents of a REGULA run and the capability seams they
//! call through.
//!
//! This crate provides:
//! - `SearchProvider` / `ReasoningProvider`, the only way an agent reaches
//!   an external backend
//! - Query feature extraction (authorities, instruments, topics, strategies)
//! - One `Agent` implementation per `AgentId`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use regula_agents::standard_registry;
//!
//! let registry = standard_registry(search, reasoning)?;
//! let orchestrator = Orchestrator::new(registry, Box::new(gate), config)?;
//! ```

use std::sync::Arc;

use regula_contracts::error::RegulaResult;
use regula_core::AgentRegistry;

pub mod capability;
pub mod compliance;
pub mod extract;
pub mod legal;
pub mod research;
pub mod review;
pub mod risk;

#[cfg(test)]
mod testing;

pub use capability::{CapabilityError, ReasoningProvider, SearchProvider};
pub use compliance::ComplianceAgent;
pub use extract::QueryFeatures;
pub use legal::LegalAnalysisAgent;
pub use research::{ResearchAgent, ResearchCoordinatorAgent};
pub use review::DocumentReviewAgent;
pub use risk::RiskAssessmentAgent;

/// A registry holding every agent, all sharing the same two backends.
pub fn standard_registry(
    search: Arc<dyn SearchProvider>,
    reasoning: Arc<dyn ReasoningProvider>,
) -> RegulaResult<AgentRegistry> {
    AgentRegistry::new()
        .with(Arc::new(ResearchCoordinatorAgent::new(search.clone(), reasoning.clone())))?
        .with(Arc::new(ResearchAgent::new(search.clone(), reasoning.clone())))?
        .with(Arc::new(ComplianceAgent::new(search, reasoning.clone())))?
        .with(Arc::new(LegalAnalysisAgent::new(reasoning.clone())))?
        .with(Arc::new(RiskAssessmentAgent::new(reasoning)))?
        .with(Arc::new(DocumentReviewAgent::new()))
}
