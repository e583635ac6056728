//! # regula-audit
//!
//! Append-only, SHA-256 hash-chained run ledger for the REGULA runtime.
//!
//! ## Overview
//!
//! The orchestrator emits one `RunReport` per run. The ledger links every
//! trace entry to the one before it and closes the chain with a seal over
//! the terminal status. Changing a single byte of a stored entry or outcome
//! breaks the chain and is caught by `verify_integrity`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use regula_audit::InMemoryLedger;
//!
//! let ledger = InMemoryLedger::new();
//! let orchestrator = orchestrator.with_observer(Box::new(ledger.clone()));
//! orchestrator.run(request).await?;
//!
//! assert!(ledger.verify_integrity());
//! let export = ledger.export()?;
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_entry, hash_seal, verify_record};
pub use event::{ChainedEntry, LedgerExport, RunOutcome, RunRecord, RunSeal, GENESIS_HASH};
pub use memory::InMemoryLedger;

// ── Tests ─────────────────────────────────────────────────────────────────────
