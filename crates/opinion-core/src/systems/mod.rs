//! ECS Systems
//!
//! Per-tick systems: snapshot capture, belief update and consensus tracking,
//! plus the diffusion operator they share.

pub mod consensus;
pub mod diffusion;
pub mod update;

// Re-export commonly used systems
pub use consensus::{
    population_stats, track_consensus, ConsensusOutcome, ConsensusRecord, ConsensusSettings,
    ConsensusTracker,
};
pub use diffusion::{BoundaryCondition, DiffusionOperator};
pub use update::{
    capture_belief_snapshot, perceived_message, social_influence, update_beliefs, AgentUpdate,
    BeliefSnapshot, DegeneratePolicy, RunFault, UpdateContext, UpdateSettings, UpdateStats,
};
