//! # regula-ref-anvisa
//!
//! Brazilian regulatory reference runtime for the REGULA orchestrator.
//!
//! Everything runs offline against a small fixed corpus (ANVISA device and
//! health-surveillance rules, the LGPD, and an ANATEL certification act):
//!
//! 1. **Device registration**: search drops two queries, agents retry, the
//!    gate accepts.
//! 2. **Compliance outage**: compliance never recovers and the run degrades
//!    after one revision.
//! 3. **Contradiction**: a revised legal analysis contradicts compliance and
//!    the revised risk assessment reconciles them.
//! 4. **Revision budget**: an out-of-corpus question exhausts its revisions.
//!
//! The corpus is paraphrased for demonstration. No external API calls are
//! made.

pub mod corpus;
pub mod faults;
pub mod providers;
pub mod runtime;
pub mod scenarios;

pub use runtime::Runtime;
