//! Startup-time mapping from agent id to implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use regula_contracts::{
    agent::AgentId,
    error::{RegulaError, RegulaResult},
};

use crate::traits::Agent;

/// The closed set of agents available to an orchestrator.
///
/// Resolved once when the orchestrator is built; routing never looks agents
/// up by anything but `AgentId`.
#[derive(Default, Clone)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentId, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `agent` under its own id. Each id may be registered once.
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> RegulaResult<()> {
        let id = agent.id();
        if self.agents.contains_key(&id) {
            return Err(RegulaError::Registry {
                reason: format!("agent '{id}' is already registered"),
            });
        }
        debug!(agent = %id, "agent registered");
        self.agents.insert(id, agent);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, agent: Arc<dyn Agent>) -> RegulaResult<Self> {
        self.register(agent)?;
        Ok(self)
    }

    pub fn get(&self, id: AgentId) -> Option<Arc<dyn Agent>> {
        self.agents.get(&id).cloned()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// Registered ids in priority order.
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The dependency-required set: every registered fact-asserting agent.
    pub fn required(&self) -> Vec<AgentId> {
        self.agents
            .keys()
            .copied()
            .filter(AgentId::asserts_facts)
            .collect()
    }

    /// Reject registries whose routing topology can never be satisfied.
    pub fn validate(&self) -> RegulaResult<()> {
        if self.required().is_empty() {
            return Err(RegulaError::Registry {
                reason: "at least one fact-asserting agent must be registered".to_string(),
            });
        }
        let has_research = self.agents.keys().any(AgentId::is_research_class);
        for grounded in [AgentId::Compliance, AgentId::LegalAnalysis] {
            if self.contains(grounded) && !has_research {
                return Err(RegulaError::Registry {
                    reason: format!(
                        "'{grounded}' depends on research but no research-class agent is registered"
                    ),
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.ids())
            .finish()
    }
}
