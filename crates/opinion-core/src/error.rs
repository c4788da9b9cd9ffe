//! Simulation Errors
//!
//! Fatal conditions of a single run. None of them is retried; the sweep driver
//! records the failure and carries on with sibling runs.

use opinion_events::FailureKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Network parameters that cannot produce a valid two-group topology
    #[error("invalid topology parameters: {0}")]
    InvalidTopologyParams(String),

    /// Model parameters outside their admissible ranges
    #[error("invalid model parameters: {0}")]
    InvalidParams(String),

    /// Zero, negative or non-finite density where a probability density is required
    #[error("degenerate belief density{}: {reason}", agent_suffix(.agent))]
    DegenerateDensity { agent: Option<usize>, reason: String },

    /// Agent selected for social influence has no neighbours
    #[error("agent {agent} has no neighbours to interact with")]
    IsolatedAgent { agent: usize },
}

fn agent_suffix(agent: &Option<usize>) -> String {
    agent.map(|a| format!(" for agent {}", a)).unwrap_or_default()
}

impl SimError {
    pub fn degenerate(reason: impl Into<String>) -> Self {
        SimError::DegenerateDensity {
            agent: None,
            reason: reason.into(),
        }
    }

    /// Attaches the agent index to a density error raised by an agent-agnostic primitive.
    pub fn for_agent(self, agent: usize) -> Self {
        match self {
            SimError::DegenerateDensity { agent: None, reason } => SimError::DegenerateDensity {
                agent: Some(agent),
                reason,
            },
            other => other,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            SimError::InvalidTopologyParams(_) => FailureKind::InvalidTopology,
            SimError::InvalidParams(_) => FailureKind::InvalidParameters,
            SimError::DegenerateDensity { .. } => FailureKind::DegenerateDensity,
            SimError::IsolatedAgent { .. } => FailureKind::IsolatedAgent,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
