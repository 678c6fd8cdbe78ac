//! Application services (use cases).
//!
//! These services orchestrate domain logic and coordinate adapters
//! to implement the engine's use cases.

pub mod aggregator;
pub mod evaluator;
pub mod intake;
pub mod learning;
pub mod persistence;
pub mod scheduler;
pub mod snapshot;
pub mod synthesizer;
pub mod validation;
