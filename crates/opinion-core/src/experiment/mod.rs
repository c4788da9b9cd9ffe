//! Experiment Driver
//!
//! Single runs and parameter sweeps.

pub mod simulation;
pub mod sweep;

pub use simulation::{run_single, Simulation};
pub use sweep::{
    aggregate_records, alpha_grid, run_job, run_sweep, Resolution, Scenario, SweepJob, SweepPlan,
    SweepReport, HIGH_RESOLUTION_ALPHAS, LOW_RESOLUTION_ALPHAS, SCENARIOS,
};
