//! Ledger record types.
//!
//! Each run becomes one `RunRecord`: its trace entries wrapped in
//! `ChainedEntry` links, closed by a `RunSeal` that commits to the terminal
//! outcome and to the last link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use regula_contracts::{
    execution::TraceEntry,
    request::{Priority, RunReport},
    state::{CoverageGap, RunId, RunStatus},
};

/// The sentinel `prev_hash` of the first link in every chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One trace entry linked into its run's chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainedEntry {
    /// Position in the chain, starting at 0.
    pub sequence: u64,
    pub entry: TraceEntry,
    /// Hash of the previous link, or `GENESIS_HASH`.
    pub prev_hash: String,
    pub this_hash: String,
}

/// The terminal outcome a seal commits to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub query: String,
    pub priority: Priority,
    pub status: RunStatus,
    pub confidence_score: f64,
    pub revision_count: u32,
    pub gaps: Vec<CoverageGap>,
}

impl From<&RunReport> for RunOutcome {
    fn from(report: &RunReport) -> Self {
        Self {
            query: report.query.clone(),
            priority: report.priority,
            status: report.status,
            confidence_score: report.confidence_score,
            revision_count: report.revision_count,
            gaps: report.gaps.clone(),
        }
    }
}

/// Closes a run's chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSeal {
    pub outcome: RunOutcome,
    /// `this_hash` of the last entry, or `GENESIS_HASH` for an empty trace.
    pub prev_hash: String,
    pub seal_hash: String,
    pub sealed_at: DateTime<Utc>,
}

/// Everything the ledger keeps for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub entries: Vec<ChainedEntry>,
    pub seal: RunSeal,
}

/// A snapshot of the whole ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerExport {
    pub records: Vec<RunRecord>,
    pub exported_at: DateTime<Utc>,
}
