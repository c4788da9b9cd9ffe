//! Belief Update System
//!
//! Advances every agent by one tick. Each agent either talks to a random
//! neighbour (probability `communication_frequency`) and combines the
//! perceived message with its own density, or lets its density diffuse.
//!
//! All reads of other agents go through [`BeliefSnapshot`], captured before any
//! agent is updated, so the outcome does not depend on update order.

use bevy_ecs::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::agent::{
    AgentIndex, BeliefDensity, BeliefSpread, Group, Identity, MeanBelief, Neighbors,
};
use crate::components::belief::{check_entries, BeliefSpace};
use crate::error::{SimError, SimResult};
use crate::setup::network::Network;
use crate::systems::diffusion::DiffusionOperator;
use crate::SimRng;

/// What to do when a social-influence posterior has no mass
/// (the agent's density and the perceived message have disjoint support).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Keep the prior density unchanged and count the event
    #[default]
    RetainPrior,
    /// Abort the run with a degenerate-density error
    Abort,
}

/// Per-run constants of the update rule
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct UpdateSettings {
    pub alpha_in: f64,
    pub alpha_out: f64,
    pub communication_frequency: f64,
    pub degenerate_policy: DegeneratePolicy,
}

impl UpdateSettings {
    /// Perception weight for a message from `speaker` heard by `listener`.
    pub fn alpha(&self, listener: Group, speaker: Group) -> f64 {
        if listener == speaker {
            self.alpha_in
        } else {
            self.alpha_out
        }
    }
}

/// Densities of all agents as they were at the start of the tick, by agent index
#[derive(Resource, Debug, Clone, Default)]
pub struct BeliefSnapshot {
    pub densities: Vec<Vec<f64>>,
}

impl BeliefSnapshot {
    pub fn new(n_agents: usize) -> Self {
        Self {
            densities: vec![Vec::new(); n_agents],
        }
    }

    pub fn density(&self, agent: usize) -> &[f64] {
        &self.densities[agent]
    }
}

/// First fatal error raised during a tick; the driver stops the run on it
#[derive(Resource, Debug, Default)]
pub struct RunFault(Option<SimError>);

impl RunFault {
    /// Keeps the first error only.
    pub fn record(&mut self, error: SimError) {
        if self.0.is_none() {
            self.0 = Some(error);
        }
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn take(&mut self) -> Option<SimError> {
        self.0.take()
    }
}

/// Counters of the update branches taken during a run
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub interactions: u64,
    pub diffusions: u64,
    pub fallbacks: u64,
}

/// Result of updating one agent
#[derive(Debug, Clone, PartialEq)]
pub enum AgentUpdate {
    Interacted(Vec<f64>),
    Diffused(Vec<f64>),
    /// Zero posterior under [`DegeneratePolicy::RetainPrior`]
    RetainedPrior,
}

/// `alpha * neighbour + (1 - alpha) * uniform`, normalized.
pub fn perceived_message(space: &BeliefSpace, message: &[f64], alpha: f64) -> SimResult<Vec<f64>> {
    let uniform = space.uniform_value();
    let perceived = message
        .iter()
        .map(|p| alpha * p + (1.0 - alpha) * uniform)
        .collect();
    space.normalized(perceived)
}

/// Pointwise product of the agent's density and the perceived message, normalized.
///
/// Fails with a degenerate-density error when the product has (numerically) no mass.
pub fn social_influence(
    space: &BeliefSpace,
    own: &[f64],
    message: &[f64],
    alpha: f64,
) -> SimResult<Vec<f64>> {
    let perceived = perceived_message(space, message, alpha)?;
    let posterior: Vec<f64> = own.iter().zip(&perceived).map(|(a, b)| a * b).collect();

    let total: f64 = posterior.iter().sum();
    if total < f64::EPSILON {
        return Err(SimError::degenerate(format!(
            "posterior has zero mass (total {:e})",
            total
        )));
    }
    space.normalized(posterior)
}

/// Shared read-only inputs of a tick
pub struct UpdateContext<'a> {
    pub space: &'a BeliefSpace,
    pub diffusion: &'a DiffusionOperator,
    pub settings: &'a UpdateSettings,
    pub network: &'a Network,
    pub snapshot: &'a BeliefSnapshot,
}

impl UpdateContext<'_> {
    /// Draw the branch for one agent and compute its new density.
    pub fn step_agent<R: Rng + ?Sized>(
        &self,
        agent: usize,
        identity: Group,
        neighbors: &[usize],
        own: &[f64],
        rng: &mut R,
    ) -> SimResult<AgentUpdate> {
        if rng.gen::<f64>() < self.settings.communication_frequency {
            let speaker = *neighbors
                .choose(rng)
                .ok_or(SimError::IsolatedAgent { agent })?;
            let alpha = self.settings.alpha(identity, self.network.group(speaker));

            match social_influence(self.space, own, self.snapshot.density(speaker), alpha) {
                Ok(posterior) => Ok(AgentUpdate::Interacted(posterior)),
                Err(SimError::DegenerateDensity { .. })
                    if self.settings.degenerate_policy == DegeneratePolicy::RetainPrior =>
                {
                    Ok(AgentUpdate::RetainedPrior)
                }
                Err(e) => Err(e.for_agent(agent)),
            }
        } else {
            self.diffusion
                .diffuse(self.space, own)
                .map(AgentUpdate::Diffused)
                .map_err(|e| e.for_agent(agent))
        }
    }
}

/// System: copy every agent's density into the tick-start snapshot
pub fn capture_belief_snapshot(
    mut snapshot: ResMut<BeliefSnapshot>,
    query: Query<(&AgentIndex, &BeliefDensity)>,
) {
    for (index, density) in query.iter() {
        snapshot.densities[index.0].clone_from(&density.0);
    }
}

/// System: update all agents from the snapshot
#[allow(clippy::too_many_arguments)]
pub fn update_beliefs(
    space: Res<BeliefSpace>,
    diffusion: Res<DiffusionOperator>,
    settings: Res<UpdateSettings>,
    network: Res<Network>,
    snapshot: Res<BeliefSnapshot>,
    mut rng: ResMut<SimRng>,
    mut fault: ResMut<RunFault>,
    mut stats: ResMut<UpdateStats>,
    mut query: Query<(
        &AgentIndex,
        &Identity,
        &Neighbors,
        &mut BeliefDensity,
        &mut MeanBelief,
        &mut BeliefSpread,
    )>,
) {
    if fault.is_set() {
        return;
    }

    let ctx = UpdateContext {
        space: &space,
        diffusion: &diffusion,
        settings: &settings,
        network: &network,
        snapshot: &snapshot,
    };

    for (index, identity, neighbors, mut density, mut mean, mut spread) in query.iter_mut() {
        let step = ctx.step_agent(index.0, identity.0, &neighbors.0, &density.0, &mut rng.0);
        let new_density = match step {
            Ok(AgentUpdate::Interacted(d)) => {
                stats.interactions += 1;
                d
            }
            Ok(AgentUpdate::Diffused(d)) => {
                stats.diffusions += 1;
                d
            }
            Ok(AgentUpdate::RetainedPrior) => {
                stats.interactions += 1;
                stats.fallbacks += 1;
                tracing::warn!(agent = index.0, "posterior had zero mass, keeping prior belief");
                continue;
            }
            Err(e) => {
                fault.record(e);
                return;
            }
        };

        if let Err(e) = check_entries(&new_density) {
            fault.record(e.for_agent(index.0));
            return;
        }

        let m = space.mean(&new_density);
        mean.0 = m;
        spread.0 = space.spread(&new_density, m);
        density.0 = new_density;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::diffusion::BoundaryCondition;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const TOL: f64 = 1e-10;

    fn space() -> BeliefSpace {
        BeliefSpace::new(200).unwrap()
    }

    fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
    }

    #[test]
    fn test_message_with_full_trust_is_the_neighbour() {
        let space = space();
        let neighbour = space.gaussian(0.3, 0.2).unwrap();
        let perceived = perceived_message(&space, &neighbour, 1.0).unwrap();
        assert!(max_abs_diff(&perceived, &neighbour) < TOL);
    }

    #[test]
    fn test_message_without_trust_is_uniform() {
        let space = space();
        let neighbour = space.gaussian(0.3, 0.2).unwrap();
        let perceived = perceived_message(&space, &neighbour, 0.0).unwrap();
        assert!(max_abs_diff(&perceived, &space.uniform()) < TOL);
    }

    #[test]
    fn test_zero_alpha_ignores_the_neighbour() {
        let space = space();
        let own = space.gaussian(-0.4, 0.2).unwrap();
        let left = space.gaussian(-0.9, 0.05).unwrap();
        let right = space.gaussian(0.9, 0.05).unwrap();

        let from_left = social_influence(&space, &own, &left, 0.0).unwrap();
        let from_right = social_influence(&space, &own, &right, 0.0).unwrap();
        assert!(max_abs_diff(&from_left, &from_right) < TOL);
        assert!(max_abs_diff(&from_left, &own) < TOL);
    }

    #[test]
    fn test_full_trust_in_identical_belief_keeps_the_opinion() {
        let space = space();
        let own = space.gaussian(0.1, 0.1).unwrap();

        let posterior = social_influence(&space, &own, &own, 1.0).unwrap();
        assert!((space.integral(&posterior) - 1.0).abs() < TOL);
        assert!((space.mean(&posterior) - space.mean(&own)).abs() < 1e-6);
        // the agreeing message only sharpens the belief
        let sharpened = space.spread(&posterior, space.mean(&posterior));
        assert!(sharpened < space.spread(&own, space.mean(&own)));
    }

    #[test]
    fn test_full_trust_in_identical_uniform_belief_is_unchanged() {
        let space = space();
        let uniform = space.uniform();
        let posterior = social_influence(&space, &uniform, &uniform, 1.0).unwrap();
        assert!(max_abs_diff(&posterior, &uniform) < TOL);
    }

    #[test]
    fn test_influence_pulls_towards_the_speaker() {
        let space = space();
        let own = space.gaussian(-0.2, 0.2).unwrap();
        let speaker = space.gaussian(0.4, 0.2).unwrap();

        let posterior = social_influence(&space, &own, &speaker, 0.8).unwrap();
        let mean = space.mean(&posterior);
        assert!(mean > -0.2 && mean < 0.4);
    }

    #[test]
    fn test_disjoint_support_is_degenerate() {
        let space = BeliefSpace::new(4).unwrap();
        let own = space.normalized(vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        let speaker = space.normalized(vec![0.0, 0.0, 0.0, 1.0]).unwrap();

        let err = social_influence(&space, &own, &speaker, 1.0).unwrap_err();
        assert!(matches!(err, SimError::DegenerateDensity { .. }));
    }

    fn line_network() -> Network {
        let matrix: Vec<Vec<u8>> = vec![
            vec![0, 1, 0, 0],
            vec![1, 0, 1, 0],
            vec![0, 1, 0, 1],
            vec![0, 0, 1, 0],
        ];
        Network::from_adjacency(&matrix).unwrap()
    }

    fn settings(communication_frequency: f64, policy: DegeneratePolicy) -> UpdateSettings {
        UpdateSettings {
            alpha_in: 1.0,
            alpha_out: 1.0,
            communication_frequency,
            degenerate_policy: policy,
        }
    }

    #[test]
    fn test_alpha_by_identity() {
        let settings = UpdateSettings {
            alpha_in: 0.8,
            alpha_out: 0.3,
            communication_frequency: 0.2,
            degenerate_policy: DegeneratePolicy::RetainPrior,
        };
        assert_eq!(settings.alpha(Group::First, Group::First), 0.8);
        assert_eq!(settings.alpha(Group::First, Group::Second), 0.3);
    }

    #[test]
    fn test_isolated_agent_fails() {
        let space = BeliefSpace::new(4).unwrap();
        let diffusion = DiffusionOperator::new(&space, 0.0, BoundaryCondition::ZeroFlux).unwrap();
        let network = line_network();
        let snapshot = BeliefSnapshot {
            densities: vec![space.uniform(); 4],
        };
        let settings = settings(1.0, DegeneratePolicy::RetainPrior);
        let ctx = UpdateContext {
            space: &space,
            diffusion: &diffusion,
            settings: &settings,
            network: &network,
            snapshot: &snapshot,
        };

        let mut rng = SmallRng::seed_from_u64(1);
        let result = ctx.step_agent(2, Group::Second, &[], &space.uniform(), &mut rng);
        assert_eq!(result, Err(SimError::IsolatedAgent { agent: 2 }));
    }

    #[test]
    fn test_degenerate_policies() {
        let space = BeliefSpace::new(4).unwrap();
        let diffusion = DiffusionOperator::new(&space, 0.0, BoundaryCondition::ZeroFlux).unwrap();
        let network = line_network();
        let spike_low = space.normalized(vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        let spike_high = space.normalized(vec![0.0, 0.0, 0.0, 1.0]).unwrap();
        let snapshot = BeliefSnapshot {
            densities: vec![spike_low.clone(), spike_high.clone(), spike_high.clone(), spike_high],
        };

        let retain = settings(1.0, DegeneratePolicy::RetainPrior);
        let ctx = UpdateContext {
            space: &space,
            diffusion: &diffusion,
            settings: &retain,
            network: &network,
            snapshot: &snapshot,
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let result = ctx.step_agent(0, Group::First, &[1], &spike_low, &mut rng);
        assert_eq!(result, Ok(AgentUpdate::RetainedPrior));

        let abort = settings(1.0, DegeneratePolicy::Abort);
        let ctx = UpdateContext { settings: &abort, ..ctx };
        let result = ctx.step_agent(0, Group::First, &[1], &spike_low, &mut rng);
        assert!(matches!(
            result,
            Err(SimError::DegenerateDensity { agent: Some(0), .. })
        ));
    }

    #[test]
    fn test_no_communication_always_diffuses() {
        let space = space();
        let diffusion = DiffusionOperator::new(&space, 2e-4, BoundaryCondition::ZeroFlux).unwrap();
        let network = line_network();
        let own = space.gaussian(0.0, 0.1).unwrap();
        let snapshot = BeliefSnapshot {
            densities: vec![own.clone(); 4],
        };
        let settings = settings(0.0, DegeneratePolicy::RetainPrior);
        let ctx = UpdateContext {
            space: &space,
            diffusion: &diffusion,
            settings: &settings,
            network: &network,
            snapshot: &snapshot,
        };

        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..20 {
            let result = ctx.step_agent(1, Group::First, &[0, 2], &own, &mut rng).unwrap();
            assert!(matches!(result, AgentUpdate::Diffused(_)));
        }
    }

    #[test]
    fn test_run_fault_keeps_first_error() {
        let mut fault = RunFault::default();
        assert!(!fault.is_set());

        fault.record(SimError::IsolatedAgent { agent: 1 });
        fault.record(SimError::IsolatedAgent { agent: 2 });
        assert!(fault.is_set());
        assert_eq!(fault.take(), Some(SimError::IsolatedAgent { agent: 1 }));
        assert!(!fault.is_set());
    }
}
