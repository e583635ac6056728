//! Provider wrappers that inject failures, latency, or scripted answers.
//!
//! Scenarios wrap the corpus providers in these to reproduce upstream
//! outages and disagreeing analyses without touching agent code.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use regula_agents::{
    capability::{
        CapabilityError, Reasoning, ReasoningProvider, ReasoningRequest, ReasoningTask, SearchHit, SearchProvider,
        SearchQuery,
    },
    extract::ResearchStrategy,
};

/// What to do to a matching call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fault {
    /// Fail the first `failures` matching calls as temporarily unavailable.
    Transient { failures: u32 },
    /// Reject every matching call.
    Permanent,
    /// Delay every matching call.
    Latency(Duration),
}

impl Fault {
    /// An outage that never recovers.
    pub fn outage() -> Self {
        Fault::Transient { failures: u32::MAX }
    }

    async fn inject(&self, call: u32, target: &str) -> Result<(), CapabilityError> {
        match *self {
            Fault::Transient { failures } if call <= failures => {
                warn!(target_provider = target, call, "injecting transient fault");
                Err(CapabilityError::Unavailable {
                    reason: format!("{target} unavailable (call {call})"),
                })
            }
            Fault::Transient { .. } => Ok(()),
            Fault::Permanent => Err(CapabilityError::Rejected {
                reason: format!("{target} refused the request"),
            }),
            Fault::Latency(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

// ── Search ───────────────────────────────────────────────────────────────────

pub struct FaultySearch {
    inner: Arc<dyn SearchProvider>,
    fault: Fault,
    /// Only calls using this strategy are affected. `None` affects all.
    strategy: Option<ResearchStrategy>,
    calls: AtomicU32,
}

impl FaultySearch {
    pub fn new(inner: Arc<dyn SearchProvider>, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            strategy: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn only(mut self, strategy: ResearchStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Matching calls seen so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for FaultySearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, CapabilityError> {
        if self.strategy.map_or(true, |s| s == query.strategy) {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.fault.inject(call, "search").await?;
        }
        self.inner.search(query).await
    }
}

// ── Reasoning ────────────────────────────────────────────────────────────────

pub struct FaultyReasoning {
    inner: Arc<dyn ReasoningProvider>,
    fault: Fault,
    /// Only calls for this task are affected. `None` affects all.
    task: Option<ReasoningTask>,
    calls: AtomicU32,
}

impl FaultyReasoning {
    pub fn new(inner: Arc<dyn ReasoningProvider>, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            task: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn only(mut self, task: ReasoningTask) -> Self {
        self.task = Some(task);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningProvider for FaultyReasoning {
    async fn reason(&self, request: &ReasoningRequest) -> Result<Reasoning, CapabilityError> {
        if self.task.map_or(true, |t| t == request.task) {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.fault.inject(call, "reasoning").await?;
        }
        self.inner.reason(request).await
    }
}

/// Answers the first calls of a task from a script, then defers to the
/// wrapped provider.
pub struct ScriptedReasoning {
    inner: Arc<dyn ReasoningProvider>,
    script: Mutex<Vec<(ReasoningTask, VecDeque<Reasoning>)>>,
}

impl ScriptedReasoning {
    pub fn new(inner: Arc<dyn ReasoningProvider>) -> Self {
        Self {
            inner,
            script: Mutex::new(Vec::new()),
        }
    }

    /// Queue `reply` for the next unscripted call of `task`.
    pub fn then(self, task: ReasoningTask, reply: Reasoning) -> Self {
        if let Ok(mut script) = self.script.lock() {
            match script.iter_mut().find(|(t, _)| *t == task) {
                Some((_, queue)) => queue.push_back(reply),
                None => script.push((task, VecDeque::from([reply]))),
            }
        }
        self
    }

    fn next(&self, task: ReasoningTask) -> Option<Reasoning> {
        let mut script = self.script.lock().ok()?;
        script.iter_mut().find(|(t, _)| *t == task)?.1.pop_front()
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedReasoning {
    async fn reason(&self, request: &ReasoningRequest) -> Result<Reasoning, CapabilityError> {
        match self.next(request.task) {
            Some(reply) => Ok(reply),
            None => self.inner.reason(request).await,
        }
    }
}
