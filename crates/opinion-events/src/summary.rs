//! Run Summary Types
//!
//! The persisted outcome of one simulation run and its trajectory snapshots.

use serde::{Deserialize, Serialize};

use crate::ParameterSet;

/// Generates a run ID from the swept coordinates and the seed.
pub fn generate_run_id(params: &ParameterSet, seed: u64) -> String {
    format!(
        "run_ain{}_aout{}_ws{}_seed{:06}",
        params.alpha_in, params.alpha_out, params.p_rewire, seed
    )
}

/// Population state recorded at one tracked tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub tick: u64,
    /// Mean of the agents' mean beliefs
    pub overall_mean: f64,
    /// Standard deviation of the agents' mean beliefs
    pub overall_sigma: f64,
    /// Per-agent mean beliefs, only with the agent reporter enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_beliefs: Option<Vec<f64>>,
    /// Per-agent belief spreads, only with the agent reporter enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreads: Option<Vec<f64>>,
}

impl TrajectoryPoint {
    pub fn new(tick: u64, overall_mean: f64, overall_sigma: f64) -> Self {
        Self {
            tick,
            overall_mean,
            overall_sigma,
            mean_beliefs: None,
            spreads: None,
        }
    }

    pub fn with_agents(mut self, mean_beliefs: Vec<f64>, spreads: Vec<f64>) -> Self {
        self.mean_beliefs = Some(mean_beliefs);
        self.spreads = Some(spreads);
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub parameters: ParameterSet,
    pub seed: u64,
    /// First tick of confirmed consensus; `None` when never reached
    pub consensus_time: Option<u64>,
    /// Mean opinion at consensus, or at the final tick when unreached
    pub consensus_opinion: f64,
    pub final_mean: f64,
    pub final_sigma: f64,
    /// Ticks actually executed (less than the horizon on early stop)
    pub ticks_run: u64,
    /// Social-influence updates that kept the prior after a zero posterior
    #[serde(default)]
    pub degenerate_fallbacks: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trajectory: Vec<TrajectoryPoint>,
}

impl RunSummary {
    pub fn reached_consensus(&self) -> bool {
        self.consensus_time.is_some()
    }

    /// Serializes the summary to a JSON line (for JSONL format).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a summary from a JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
