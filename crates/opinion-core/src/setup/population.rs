//! Population Spawning
//!
//! Spawns one agent entity per network node with its identity, neighbourhood
//! and initial Gaussian belief.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;

use crate::components::agent::{
    Agent, AgentIndex, BeliefDensity, BeliefSpread, Group, Identity, MeanBelief, Neighbors,
};
use crate::components::belief::BeliefSpace;
use crate::error::{SimError, SimResult};
use crate::setup::network::Network;

/// Parameters of the initial belief distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationParams {
    /// Width of every initial Gaussian
    pub sig_op_0: f64,
    /// Initial bias between the groups in `[-1, 1]`
    pub delta_0: f64,
}

impl PopulationParams {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.sig_op_0.is_finite() && self.sig_op_0 > 0.0) {
            return Err(SimError::InvalidParams(format!(
                "sig_op_0 must be positive, got {}",
                self.sig_op_0
            )));
        }
        if !(-1.0..=1.0).contains(&self.delta_0) {
            return Err(SimError::InvalidParams(format!(
                "delta_0 must be in [-1, 1], got {}",
                self.delta_0
            )));
        }
        Ok(())
    }

    /// Probability that a member of `group` starts with a positive mean opinion.
    pub fn positive_probability(&self, group: Group) -> f64 {
        match group {
            Group::First => 0.5 + self.delta_0 / 2.0,
            Group::Second => 0.5 - self.delta_0 / 2.0,
        }
    }
}

/// Draw the initial belief of one agent: a Gaussian whose mean has a random
/// magnitude in `[0, 1)` and a sign biased by the agent's group.
pub fn initial_density(
    space: &BeliefSpace,
    group: Group,
    params: &PopulationParams,
    rng: &mut SmallRng,
) -> SimResult<Vec<f64>> {
    let positive = rng.gen::<f64>() < params.positive_probability(group);
    let magnitude: f64 = rng.gen();
    let mu = if positive { magnitude } else { -magnitude };
    space.gaussian(mu, params.sig_op_0)
}

/// Spawn the whole population, in agent index order.
pub fn spawn_population(
    world: &mut World,
    network: &Network,
    space: &BeliefSpace,
    params: &PopulationParams,
    rng: &mut SmallRng,
) -> SimResult<Vec<Entity>> {
    params.validate()?;

    let mut entities = Vec::with_capacity(network.n_agents());
    for index in 0..network.n_agents() {
        let group = network.group(index);
        let density = initial_density(space, group, params, rng)?;
        let mean = space.mean(&density);
        let spread = space.spread(&density, mean);

        let entity = world
            .spawn((
                Agent,
                AgentIndex(index),
                Identity(group),
                Neighbors(network.neighbors(index).to_vec()),
                BeliefDensity(density),
                MeanBelief(mean),
                BeliefSpread(spread),
            ))
            .id();
        entities.push(entity);
    }

    tracing::debug!(agents = entities.len(), "spawned population");
    Ok(entities)
}

/// Summary of spawned agents
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationSummary {
    pub total_agents: usize,
    pub by_group: [usize; 2],
    /// Fraction of each group starting with a positive mean opinion
    pub positive_fraction: [f64; 2],
}

pub fn population_summary(world: &mut World) -> PopulationSummary {
    let mut by_group = [0usize; 2];
    let mut positive = [0usize; 2];

    let mut query = world.query_filtered::<(&Identity, &MeanBelief), With<Agent>>();
    for (identity, mean) in query.iter(world) {
        let slot = identity.0.label() as usize;
        by_group[slot] += 1;
        if mean.0 > 0.0 {
            positive[slot] += 1;
        }
    }

    let fraction = |slot: usize| {
        if by_group[slot] == 0 {
            0.0
        } else {
            positive[slot] as f64 / by_group[slot] as f64
        }
    };

    PopulationSummary {
        total_agents: by_group[0] + by_group[1],
        by_group,
        positive_fraction: [fraction(0), fraction(1)],
    }
}

impl std::fmt::Display for PopulationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total agents: {}", self.total_agents)?;
        for slot in 0..2 {
            writeln!(
                f,
                "  group {}: {} agents, {:.0}% positive",
                slot,
                self.by_group[slot],
                self.positive_fraction[slot] * 100.0
            )?;
        }
        Ok(())
    }
}
