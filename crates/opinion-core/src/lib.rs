//! In-group Bias Opinion Dynamics Engine
//!
//! Agents on a two-group small-world network hold beliefs as probability
//! densities over `(-1, 1)`. Each tick an agent either weighs a random
//! neighbour's belief, trusting in-group members more than out-group ones, or
//! lets its own belief diffuse. The engine records whether and when the
//! population reaches consensus.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod components;
pub mod config;
pub mod error;
pub mod experiment;
pub mod output;
pub mod setup;
pub mod systems;

pub use components::*;
pub use config::{default_config_toml, default_track_times, ConfigError, SimConfig};
pub use error::{SimError, SimResult};
pub use experiment::{run_single, run_sweep, Resolution, Simulation, SweepPlan, SweepReport};

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);

/// Current tick of a run. Tick 0 is the initial state; tick `t` is the state
/// after `t` updates.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationClock {
    pub tick: u64,
    pub max_ticks: u64,
}
