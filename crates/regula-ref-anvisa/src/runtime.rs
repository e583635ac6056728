//! Wiring for a complete REGULA runtime: agents, gate, orchestrator, and
//! the hash-chained ledger that observes every run.

use std::sync::Arc;

use regula_agents::{standard_registry, ReasoningProvider, SearchProvider};
use regula_audit::InMemoryLedger;
use regula_config::OrchestratorConfig;
use regula_contracts::{
    error::RegulaResult,
    request::{AnalysisOutput, AnalysisRequest},
};
use regula_core::Orchestrator;
use regula_quality::RegulatoryGate;

use crate::providers::{CorpusReasoning, CorpusSearch};

pub struct Runtime {
    pub orchestrator: Orchestrator,
    /// Shares storage with the observer handed to the orchestrator.
    pub ledger: InMemoryLedger,
}

impl Runtime {
    pub fn new(
        config: OrchestratorConfig,
        search: Arc<dyn SearchProvider>,
        reasoning: Arc<dyn ReasoningProvider>,
    ) -> RegulaResult<Self> {
        let registry = standard_registry(search, reasoning)?;
        let ledger = InMemoryLedger::new();
        let orchestrator = Orchestrator::new(registry, Box::new(RegulatoryGate::new()?), config)?
            .with_observer(Box::new(ledger.clone()));
        Ok(Self { orchestrator, ledger })
    }

    /// A runtime over the offline corpus with no injected faults.
    pub fn offline(config: OrchestratorConfig) -> RegulaResult<Self> {
        Self::new(config, Arc::new(CorpusSearch), Arc::new(CorpusReasoning))
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> RegulaResult<AnalysisOutput> {
        self.orchestrator.run(request).await
    }
}
