//! Scripted capability providers shared by the agent tests.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regula_contracts::{
    agent::{AgentId, AgentView},
    finding::ComplianceVerdict,
    request::{AnalysisRequest, Priority},
    state::AnalysisState,
};

use crate::capability::{
    CapabilityError, Reasoning, ReasoningProvider, ReasoningRequest, SearchHit, SearchProvider, SearchQuery,
};
use crate::extract::ResearchStrategy;

pub(crate) fn hit(id: &str, relevance: f64) -> SearchHit {
    SearchHit {
        id: id.to_string(),
        url: format!("https://www.in.gov.br/{id}"),
        title: id.to_uppercase(),
        excerpt: format!("excerpt of {id}"),
        regulatory_body: Some("ANVISA".to_string()),
        relevance,
    }
}

pub(crate) fn reasoning(text: &str, verdict: Option<ComplianceVerdict>, confidence: f64) -> Reasoning {
    Reasoning {
        text: text.to_string(),
        verdict,
        items: vec!["technical dossier".to_string()],
        confidence,
    }
}

/// A first-round view for `agent` over `query`, with no prior findings.
pub(crate) fn view(agent: AgentId, query: &str) -> AgentView {
    let state = AnalysisState::new(&AnalysisRequest::new(query, Priority::High));
    state.view_for(agent, vec![], Instant::now() + Duration::from_secs(30))
}

/// Returns the same hits for every query and records what it was asked.
#[derive(Default)]
pub(crate) struct StaticSearch {
    pub hits: Vec<SearchHit>,
    /// Fails every query using this strategy.
    pub fail_on: Option<(ResearchStrategy, CapabilityError)>,
    pub queries: Arc<Mutex<Vec<SearchQuery>>>,
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, CapabilityError> {
        self.queries.lock().unwrap().push(query.clone());
        match &self.fail_on {
            Some((strategy, err)) if *strategy == query.strategy => Err(err.clone()),
            _ => Ok(self.hits.iter().take(query.max_results).cloned().collect()),
        }
    }
}

/// Answers every request with `reply`, or fails with `error`.
pub(crate) struct StaticReasoning {
    pub reply: Reasoning,
    pub error: Option<CapabilityError>,
    pub requests: Arc<Mutex<Vec<ReasoningRequest>>>,
}

impl StaticReasoning {
    pub fn new(reply: Reasoning) -> Self {
        Self {
            reply,
            error: None,
            requests: Arc::new(Mutex::new(vec![])),
        }
    }
}

#[async_trait]
impl ReasoningProvider for StaticReasoning {
    async fn reason(&self, request: &ReasoningRequest) -> Result<Reasoning, CapabilityError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.reply.clone()),
        }
    }
}
