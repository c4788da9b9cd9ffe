//! Sample data fixtures for testing.
//!
//! Ready-made sweep records for other crates' tests. Enable the
//! `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // opinion-events = { path = "../opinion-events", features = ["test-fixtures"] }
//!
//! use opinion_events::fixtures;
//!
//! let records = fixtures::sample_sweep();
//! ```

use crate::{RunSummary, SweepRecord};

/// Returns the sample sweep records from the fixtures file.
///
/// Contains 4 records of a low-resolution sweep with `n_agents = 100`:
/// - 2 unbiased runs (0.25, 0.25) that reached consensus
/// - 1 biased run (0.75, 0.25) that never reached consensus
/// - 1 biased run (0.75, 0.25) that failed with a degenerate density
pub fn sample_sweep() -> Vec<SweepRecord> {
    let jsonl = include_str!("../tests/fixtures/sample_sweep.jsonl");
    jsonl
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            SweepRecord::from_jsonl(l).unwrap_or_else(|e| {
                panic!("Failed to parse sweep line: {}\nError: {}", l, e)
            })
        })
        .collect()
}

/// Returns only the completed runs from the sample sweep.
pub fn sample_summaries() -> Vec<RunSummary> {
    sample_sweep()
        .into_iter()
        .filter_map(|r| match r {
            SweepRecord::Completed(summary) => Some(summary),
            SweepRecord::Failed(_) => None,
        })
        .collect()
}
