//! Sweep Record Types
//!
//! One record per `(parameters, seed)` combination of a sweep, plus the
//! per-key aggregate computed over the successful runs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ParameterSet, RunSummary};

/// Why a run was excluded from the sweep aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidTopology,
    InvalidParameters,
    DegenerateDensity,
    IsolatedAgent,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidTopology => write!(f, "invalid_topology"),
            FailureKind::InvalidParameters => write!(f, "invalid_parameters"),
            FailureKind::DegenerateDensity => write!(f, "degenerate_density"),
            FailureKind::IsolatedAgent => write!(f, "isolated_agent"),
        }
    }
}

/// A run that aborted with a fatal error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub run_id: String,
    pub parameters: ParameterSet,
    pub seed: u64,
    pub kind: FailureKind,
    pub reason: String,
}

/// One line of a sweep's JSONL output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SweepRecord {
    Completed(RunSummary),
    Failed(RunFailure),
}

impl SweepRecord {
    pub fn run_id(&self) -> &str {
        match self {
            SweepRecord::Completed(summary) => &summary.run_id,
            SweepRecord::Failed(failure) => &failure.run_id,
        }
    }

    pub fn parameters(&self) -> &ParameterSet {
        match self {
            SweepRecord::Completed(summary) => &summary.parameters,
            SweepRecord::Failed(failure) => &failure.parameters,
        }
    }

    pub fn seed(&self) -> u64 {
        match self {
            SweepRecord::Completed(summary) => summary.seed,
            SweepRecord::Failed(failure) => failure.seed,
        }
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            SweepRecord::Completed(summary) => Some(summary),
            SweepRecord::Failed(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SweepRecord::Failed(_))
    }

    /// Serializes the record to a JSON line (for JSONL format).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a record from a JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Statistics over all seeds of one swept parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepAggregate {
    pub alpha_in: f64,
    pub alpha_out: f64,
    pub p_rewire: f64,
    /// Runs of this combination, failures included
    pub runs: usize,
    pub failures: usize,
    pub consensus_reached: usize,
    /// Share of completed runs that reached consensus
    pub consensus_fraction: f64,
    /// Mean consensus time over runs that reached consensus
    pub mean_consensus_time: Option<f64>,
    /// Mean final dispersion over completed runs
    pub mean_final_sigma: Option<f64>,
}
