//! # regula-quality
//!
//! The quality control gate for the REGULA runtime.
//!
//! This crate provides [`gate::RegulatoryGate`], which implements the
//! [`regula_core::traits::QualityGate`] trait. It judges the latest finding
//! of each agent for coverage, grounding, structure, consistency and
//! confidence, and turns the collected failures into a single verdict.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use regula_quality::RegulatoryGate;
//!
//! let gate = RegulatoryGate::new()?;
//! let orchestrator = Orchestrator::new(registry, Box::new(gate), config)?;
//! ```

pub mod gate;
pub mod schema;

pub use gate::RegulatoryGate;
