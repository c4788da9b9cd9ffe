//! Shared record types and serialization for the opinion dynamics simulator.
//!
//! This crate contains pure data structures with no simulation logic.
//! The engine in `opinion-core` produces these records; analysis tooling
//! only needs to depend on this crate to read them back.

pub mod params;
pub mod summary;
pub mod sweep;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

// Re-export parameter types
pub use params::{ParameterKey, ParameterSet};

// Re-export run summary types
pub use summary::{generate_run_id, RunSummary, TrajectoryPoint};

// Re-export sweep types
pub use sweep::{FailureKind, RunFailure, SweepAggregate, SweepRecord};
