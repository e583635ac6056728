//! # regula-core
//!
//! The bounded orchestration runtime for REGULA agents.
//!
//! This crate provides:
//! - The seam traits (`Agent`, `QualityGate`, `RunObserver`)
//! - The `AgentRegistry`, the dependency-aware `Router`, and the phase machine
//! - Per-dispatch retry with exponential backoff
//! - The `Finalizer` and the `Orchestrator` that drives a run end to end
//!
//! ## Usage
//!
//! ```rust,ignore
//! use regula_core::{AgentRegistry, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(registry, Box::new(gate), config)?;
//! let output = orchestrator.run(request).await?;
//! ```

pub mod finalizer;
pub mod machine;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod router;
pub mod traits;

pub use finalizer::Finalizer;
pub use orchestrator::Orchestrator;
pub use registry::AgentRegistry;
pub use retry::RetryPolicy;
pub use tokio_util::sync::CancellationToken;
