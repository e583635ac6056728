//! In-memory run ledger.
//!
//! `InMemoryLedger` implements `RunObserver`: every report the orchestrator
//! emits is chained and sealed into a `RunRecord`. Clones share the same
//! records, so a caller can hand one clone to the orchestrator and keep
//! another for `export()` and `verify_integrity()`.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::info;

use regula_contracts::{
    error::{RegulaError, RegulaResult},
    request::RunReport,
    state::RunId,
};
use regula_core::traits::RunObserver;

use crate::{
    chain::{hash_entry, hash_seal, verify_record},
    event::{ChainedEntry, LedgerExport, RunOutcome, RunRecord, RunSeal, GENESIS_HASH},
};

/// Append-only ledger of sealed runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    pub(crate) records: Arc<Mutex<Vec<RunRecord>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RegulaResult<MutexGuard<'_, Vec<RunRecord>>> {
        self.records.lock().map_err(|e| RegulaError::Observability {
            reason: format!("ledger lock poisoned: {e}"),
        })
    }

    /// Number of sealed runs.
    pub fn len(&self) -> usize {
        self.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sealed record of `run_id`, if it was emitted.
    pub fn record(&self, run_id: &RunId) -> Option<RunRecord> {
        self.lock()
            .ok()?
            .iter()
            .find(|r| &r.run_id == run_id)
            .cloned()
    }

    /// Snapshot every sealed run.
    pub fn export(&self) -> RegulaResult<LedgerExport> {
        Ok(LedgerExport {
            records: self.lock()?.clone(),
            exported_at: Utc::now(),
        })
    }

    /// True when every stored record still matches its hashes.
    pub fn verify_integrity(&self) -> bool {
        match self.lock() {
            Ok(records) => records.iter().all(verify_record),
            Err(_) => false,
        }
    }
}

impl RunObserver for InMemoryLedger {
    fn emit(&self, report: &RunReport) -> RegulaResult<()> {
        let mut entries = Vec::with_capacity(report.trace.len());
        let mut prev_hash = GENESIS_HASH.to_string();
        for (sequence, entry) in report.trace.iter().enumerate() {
            let sequence = sequence as u64;
            let this_hash = hash_entry(&report.run_id, sequence, entry, &prev_hash)?;
            entries.push(ChainedEntry {
                sequence,
                entry: entry.clone(),
                prev_hash,
                this_hash: this_hash.clone(),
            });
            prev_hash = this_hash;
        }

        let outcome = RunOutcome::from(report);
        let seal_hash = hash_seal(&report.run_id, &outcome, &prev_hash)?;

        let mut records = self.lock()?;
        if records.iter().any(|r| r.run_id == report.run_id) {
            return Err(RegulaError::Observability {
                reason: format!("run {} was already sealed", report.run_id),
            });
        }

        info!(
            run_id = %report.run_id,
            status = %report.status,
            entries = entries.len(),
            seal_hash = %seal_hash,
            "run sealed"
        );

        records.push(RunRecord {
            run_id: report.run_id.clone(),
            entries,
            seal: RunSeal {
                outcome,
                prev_hash,
                seal_hash,
                sealed_at: Utc::now(),
            },
        });
        Ok(())
    }
}
