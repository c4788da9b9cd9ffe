//! Agent Components
//!
//! Components for individual agents: identity, belief density, neighbourhood.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Marker component identifying an entity as an agent
#[derive(Component, Debug, Clone, Default)]
pub struct Agent;

/// Position of the agent in the network and in every per-agent vector
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentIndex(pub usize);

/// One of the two identity groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    First,
    Second,
}

impl Group {
    /// Numeric label (0 or 1)
    pub fn label(self) -> u8 {
        match self {
            Group::First => 0,
            Group::Second => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Group::First => Group::Second,
            Group::Second => Group::First,
        }
    }
}

/// Social identity of an agent, fixed for the run
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(pub Group);

/// Agent's opinion as a probability density over the belief space.
///
/// Always normalized so that `sum * db == 1`.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct BeliefDensity(pub Vec<f64>);

/// Density-weighted mean opinion, recomputed after every update
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct MeanBelief(pub f64);

/// Density-weighted standard deviation of the opinion (uncertainty)
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct BeliefSpread(pub f64);

/// Indices of the agents this agent can hear from
#[derive(Component, Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighbors(pub Vec<usize>);

impl Neighbors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_labels() {
        assert_eq!(Group::First.label(), 0);
        assert_eq!(Group::Second.label(), 1);
        assert_eq!(Group::First.other(), Group::Second);
        assert_eq!(Group::Second.other().other(), Group::Second);
    }

    #[test]
    fn test_neighbors() {
        let neighbors = Neighbors(vec![1, 4, 9]);
        assert_eq!(neighbors.len(), 3);
        assert!(!neighbors.is_empty());
        assert!(Neighbors::default().is_empty());
    }
}
