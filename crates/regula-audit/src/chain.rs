//! Hash-chain primitives.
//!
//! Entry hash input, in order:
//!   1. run id as UTF-8
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 (64 hex chars)
//!   4. compact JSON of the trace entry
//!
//! Seal hash input: run id, the literal `seal`, prev_hash, compact JSON of
//! the outcome.

use sha2::{Digest, Sha256};

use regula_contracts::{
    error::{RegulaError, RegulaResult},
    execution::TraceEntry,
    state::RunId,
};

use crate::event::{RunOutcome, RunRecord, GENESIS_HASH};

fn to_json<T: serde::Serialize>(value: &T) -> RegulaResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| RegulaError::Observability {
        reason: format!("failed to serialize ledger content: {e}"),
    })
}

/// SHA-256 of one chained trace entry, as lowercase hex.
pub fn hash_entry(run_id: &RunId, sequence: u64, entry: &TraceEntry, prev_hash: &str) -> RegulaResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(run_id.to_string().as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(to_json(entry)?);
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of a run's seal, as lowercase hex.
pub fn hash_seal(run_id: &RunId, outcome: &RunOutcome, prev_hash: &str) -> RegulaResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(run_id.to_string().as_bytes());
    hasher.update(b"seal");
    hasher.update(prev_hash.as_bytes());
    hasher.update(to_json(outcome)?);
    Ok(hex::encode(hasher.finalize()))
}

/// True when every link and the seal of `record` recompute to their stored
/// hashes and each `prev_hash` points at its predecessor.
pub fn verify_record(record: &RunRecord) -> bool {
    let mut expected_prev = GENESIS_HASH.to_string();

    for (position, link) in record.entries.iter().enumerate() {
        if link.sequence != position as u64 || link.prev_hash != expected_prev {
            return false;
        }
        match hash_entry(&record.run_id, link.sequence, &link.entry, &link.prev_hash) {
            Ok(hash) if hash == link.this_hash => expected_prev = link.this_hash.clone(),
            _ => return false,
        }
    }

    let seal = &record.seal;
    seal.prev_hash == expected_prev
        && matches!(
            hash_seal(&record.run_id, &seal.outcome, &seal.prev_hash),
            Ok(hash) if hash == seal.seal_hash
        )
}
