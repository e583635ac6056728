//! # regula-config
//!
//! TOML-driven configuration for the REGULA orchestrator: per-priority time
//! budgets and confidence floors, the revision ceiling, the retry schedule
//! for transient agent failures, and the weights of the aggregate
//! confidence mean.
//!
//! ```rust,ignore
//! use std::path::Path;
//! use regula_config::OrchestratorConfig;
//!
//! let config = OrchestratorConfig::from_file(Path::new("regula.toml"))?;
//! ```

pub mod config;

pub use config::{OrchestratorConfig, PriorityBudget, PriorityBudgets, RetrySettings};
