//! # zs-data
//!
//! Aligns raw experiment results into typed dataset/task bookkeeping and
//! provides an in-memory scoring oracle over those results.

pub mod context;
pub mod scorer;

pub use context::{ContextSummary, ZeroshotSimulatorContext};
pub use scorer::BestErrorScorer;
