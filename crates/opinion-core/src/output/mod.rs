//! Output
//!
//! Result files: per-run summaries, sweep JSONL logs and aggregates.

pub mod logger;
pub mod records;

pub use logger::SweepLogger;
pub use records::*;
