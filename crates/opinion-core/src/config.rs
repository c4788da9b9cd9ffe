//! Configuration loading for simulation runs.
//!
//! All model and run settings can be loaded from a TOML file; every section and
//! field is optional and falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use opinion_events::ParameterSet;

use crate::components::belief::DEFAULT_N_BELIEFS;
use crate::error::{SimError, SimResult};
use crate::setup::network::TopologyParams;
use crate::setup::population::PopulationParams;
use crate::systems::consensus::{
    ConsensusSettings, DEFAULT_CONFIRMATION_TICKS, DEFAULT_SIGMA_THRESHOLD,
};
use crate::systems::diffusion::BoundaryCondition;
use crate::systems::update::{DegeneratePolicy, UpdateSettings};

/// Complete simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Two-group network settings
    #[serde(default)]
    pub network: NetworkConfig,
    /// Belief axis and initial beliefs
    #[serde(default)]
    pub belief: BeliefConfig,
    /// Update rule settings
    #[serde(default)]
    pub dynamics: DynamicsConfig,
    /// Consensus detection settings
    #[serde(default)]
    pub consensus: ConsensusConfig,
    /// Horizon, seed and recording
    #[serde(default)]
    pub run: RunConfig,
}

impl SimConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks every parameter range. Topology violations are reported as
    /// [`SimError::InvalidTopologyParams`], everything else as
    /// [`SimError::InvalidParams`].
    pub fn validate(&self) -> SimResult<()> {
        self.topology().validate()?;
        self.validate_model()
    }

    /// Every check except the network topology (used with imported networks).
    pub fn validate_model(&self) -> SimResult<()> {
        self.population().validate()?;

        let d = &self.dynamics;
        for (name, alpha) in [("alpha_in", d.alpha_in), ("alpha_out", d.alpha_out)] {
            if !(0.0..1.0).contains(&alpha) {
                return Err(SimError::InvalidParams(format!(
                    "{} must be in [0, 1), got {}",
                    name, alpha
                )));
            }
        }
        if d.alpha_out > d.alpha_in {
            return Err(SimError::InvalidParams(format!(
                "alpha_out ({}) must not exceed alpha_in ({})",
                d.alpha_out, d.alpha_in
            )));
        }
        if !(0.0..=1.0).contains(&d.communication_frequency) {
            return Err(SimError::InvalidParams(format!(
                "communication_frequency must be in [0, 1], got {}",
                d.communication_frequency
            )));
        }
        if !(d.kappa.is_finite() && d.kappa >= 0.0) {
            return Err(SimError::InvalidParams(format!(
                "kappa must be finite and non-negative, got {}",
                d.kappa
            )));
        }
        if self.belief.n_beliefs < 2 {
            return Err(SimError::InvalidParams(format!(
                "n_beliefs must be at least 2, got {}",
                self.belief.n_beliefs
            )));
        }
        if !(self.consensus.sigma_threshold.is_finite() && self.consensus.sigma_threshold > 0.0) {
            return Err(SimError::InvalidParams(format!(
                "sigma_threshold must be positive, got {}",
                self.consensus.sigma_threshold
            )));
        }
        Ok(())
    }

    pub fn topology(&self) -> TopologyParams {
        let n = &self.network;
        TopologyParams::new(n.n_agents, n.k, n.k_in, n.k_out, n.p_rewire)
    }

    pub fn population(&self) -> PopulationParams {
        PopulationParams {
            sig_op_0: self.belief.sig_op_0,
            delta_0: self.belief.delta_0,
        }
    }

    pub fn update_settings(&self) -> UpdateSettings {
        UpdateSettings {
            alpha_in: self.dynamics.alpha_in,
            alpha_out: self.dynamics.alpha_out,
            communication_frequency: self.dynamics.communication_frequency,
            degenerate_policy: self.dynamics.degenerate_policy,
        }
    }

    pub fn consensus_settings(&self) -> ConsensusSettings {
        ConsensusSettings {
            sigma_threshold: self.consensus.sigma_threshold,
            confirmation_ticks: self.consensus.confirmation_ticks,
        }
    }

    /// Explicit track times, or the default spacing for the horizon.
    pub fn track_times(&self) -> Vec<u64> {
        if self.run.track_times.is_empty() {
            default_track_times(self.run.ticks)
        } else {
            self.run.track_times.clone()
        }
    }

    /// The flat parameter record attached to run summaries.
    pub fn parameter_set(&self) -> ParameterSet {
        ParameterSet {
            n_agents: self.network.n_agents,
            k: self.network.k,
            k_in: self.network.k_in,
            k_out: self.network.k_out,
            alpha_in: self.dynamics.alpha_in,
            alpha_out: self.dynamics.alpha_out,
            sig_op_0: self.belief.sig_op_0,
            communication_frequency: self.dynamics.communication_frequency,
            kappa: self.dynamics.kappa,
            delta_0: self.belief.delta_0,
            p_rewire: self.network.p_rewire,
            ticks: self.run.ticks,
            n_beliefs: self.belief.n_beliefs,
            sigma_threshold: self.consensus.sigma_threshold,
        }
    }

    /// Copy with a different perception pair and rewiring probability.
    pub fn with_sweep_point(&self, alpha_in: f64, alpha_out: f64, p_rewire: f64) -> Self {
        let mut config = self.clone();
        config.dynamics.alpha_in = alpha_in;
        config.dynamics.alpha_out = alpha_out;
        config.network.p_rewire = p_rewire;
        config
    }
}

/// Snapshot ticks from 0 to `ticks` inclusive: every 100 ticks for short
/// horizons, otherwise a tenth of the horizon capped at 5000.
pub fn default_track_times(ticks: u64) -> Vec<u64> {
    let step = if ticks <= 1000 {
        100
    } else {
        (ticks / 10).min(5000)
    };
    (0..=ticks).step_by(step as usize).collect()
}

/// Two-group network settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Number of agents (even; split into two equal groups)
    pub n_agents: usize,
    /// Mean degree
    pub k: usize,
    /// Expected in-group degree
    pub k_in: usize,
    /// Expected out-group degree
    pub k_out: usize,
    /// Rewiring probability
    pub p_rewire: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            n_agents: 100,
            k: 10,
            k_in: 8,
            k_out: 2,
            p_rewire: 0.0,
        }
    }
}

/// Belief axis and initial belief settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeliefConfig {
    /// Number of bins on the opinion axis
    pub n_beliefs: usize,
    /// Width of the initial Gaussians
    pub sig_op_0: f64,
    /// Initial bias between the groups
    pub delta_0: f64,
}

impl Default for BeliefConfig {
    fn default() -> Self {
        Self {
            n_beliefs: DEFAULT_N_BELIEFS,
            sig_op_0: 0.2,
            delta_0: 0.0,
        }
    }
}

/// Update rule settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsConfig {
    /// Perception weight for in-group messages
    pub alpha_in: f64,
    /// Perception weight for out-group messages
    pub alpha_out: f64,
    /// Per-tick probability of an interaction instead of diffusion
    pub communication_frequency: f64,
    /// Diffusion coefficient
    pub kappa: f64,
    pub boundary: BoundaryCondition,
    pub degenerate_policy: DegeneratePolicy,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            alpha_in: 0.75,
            alpha_out: 0.25,
            communication_frequency: 0.2,
            kappa: 2e-4,
            boundary: BoundaryCondition::ZeroFlux,
            degenerate_policy: DegeneratePolicy::RetainPrior,
        }
    }
}

/// Consensus detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Population standard deviation of mean beliefs below which agents agree
    pub sigma_threshold: f64,
    /// Consecutive ticks below the threshold needed to confirm consensus
    pub confirmation_ticks: u64,
    /// End the run as soon as consensus is confirmed
    pub stop_on_consensus: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            sigma_threshold: DEFAULT_SIGMA_THRESHOLD,
            confirmation_ticks: DEFAULT_CONFIRMATION_TICKS,
            stop_on_consensus: false,
        }
    }
}

/// Horizon, seed and recording settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of ticks to simulate
    pub ticks: u64,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Ticks at which to snapshot the population (empty = default spacing)
    pub track_times: Vec<u64>,
    /// Record per-agent means and spreads in each snapshot
    pub agent_reporter: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ticks: 3000,
            seed: 42,
            track_times: Vec::new(),
            agent_reporter: false,
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// The default configuration as an annotated TOML document.
pub fn default_config_toml() -> String {
    r#"# Opinion dynamics simulation configuration

[network]
n_agents = 100        # even; agents 0..n/2 form the first group
k = 10                # mean degree
k_in = 8              # expected in-group degree
k_out = 2             # expected out-group degree
p_rewire = 0.0        # rewiring probability

[belief]
n_beliefs = 200       # bins on the opinion axis (-1, 1)
sig_op_0 = 0.2        # width of the initial Gaussians
delta_0 = 0.0         # initial bias between the groups, in [-1, 1]

[dynamics]
alpha_in = 0.75                 # perception weight for in-group messages
alpha_out = 0.25                # perception weight for out-group messages
communication_frequency = 0.2   # probability of interacting instead of diffusing
kappa = 0.0002                  # diffusion coefficient
boundary = "zero_flux"          # or "absorbing"
degenerate_policy = "retain_prior"  # or "abort"

[consensus]
sigma_threshold = 0.01
confirmation_ticks = 20
stop_on_consensus = false

[run]
ticks = 3000
seed = 42
track_times = []      # empty: every 100 ticks, or T/10 for long horizons
agent_reporter = false
"#
    .to_string()
}
