//! Single Run Driver
//!
//! Builds the ECS world for one `(parameters, seed)` combination and advances
//! it tick by tick.

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use opinion_events::{generate_run_id, ParameterSet, RunSummary};

use crate::components::agent::{AgentIndex, BeliefDensity, BeliefSpread, MeanBelief};
use crate::components::belief::BeliefSpace;
use crate::config::SimConfig;
use crate::error::SimResult;
use crate::setup::network::Network;
use crate::setup::population::{population_summary, spawn_population};
use crate::systems::consensus::{track_consensus, ConsensusTracker};
use crate::systems::diffusion::DiffusionOperator;
use crate::systems::update::{
    capture_belief_snapshot, update_beliefs, BeliefSnapshot, RunFault, UpdateStats,
};
use crate::{SimRng, SimulationClock};

/// One simulation run: its world, schedule and parameters.
pub struct Simulation {
    world: World,
    schedule: Schedule,
    parameters: ParameterSet,
    seed: u64,
    stop_on_consensus: bool,
}

impl Simulation {
    /// Generate the network from the configured topology and spawn the population.
    pub fn new(config: &SimConfig, seed: u64) -> SimResult<Self> {
        config.validate()?;

        let mut rng = SmallRng::seed_from_u64(seed);
        let network = Network::generate(&config.topology(), &mut rng)?;
        Self::assemble(config, config.parameter_set(), seed, network, rng)
    }

    /// Run on an imported network. The configured topology is ignored; the
    /// recorded degrees are the realized ones.
    pub fn with_network(config: &SimConfig, seed: u64, network: Network) -> SimResult<Self> {
        config.validate_model()?;

        let stats = network.degree_stats();
        let mut parameters = config.parameter_set();
        parameters.n_agents = network.n_agents();
        parameters.k = stats.mean_degree.round() as usize;
        parameters.k_in = stats.mean_in_group_degree.round() as usize;
        parameters.k_out = stats.mean_out_group_degree.round() as usize;

        let isolated = network.isolated_agents();
        if !isolated.is_empty() {
            warn!(count = isolated.len(), "imported network has isolated agents");
        }

        Self::assemble(config, parameters, seed, network, SmallRng::seed_from_u64(seed))
    }

    fn assemble(
        config: &SimConfig,
        parameters: ParameterSet,
        seed: u64,
        network: Network,
        mut rng: SmallRng,
    ) -> SimResult<Self> {
        let space = BeliefSpace::new(config.belief.n_beliefs)?;
        let diffusion =
            DiffusionOperator::new(&space, config.dynamics.kappa, config.dynamics.boundary)?;

        let mut world = World::new();
        spawn_population(&mut world, &network, &space, &config.population(), &mut rng)?;

        let degrees = network.degree_stats();
        debug!(
            seed,
            agents = network.n_agents(),
            mean_in_degree = degrees.mean_in_group_degree,
            mean_out_degree = degrees.mean_out_group_degree,
            "world assembled"
        );
        debug!("{}", population_summary(&mut world));

        world.insert_resource(SimulationClock {
            tick: 0,
            max_ticks: config.run.ticks,
        });
        world.insert_resource(SimRng(rng));
        world.insert_resource(BeliefSnapshot::new(network.n_agents()));
        world.insert_resource(space);
        world.insert_resource(diffusion);
        world.insert_resource(network);
        world.insert_resource(config.update_settings());
        world.insert_resource(RunFault::default());
        world.insert_resource(UpdateStats::default());
        world.insert_resource(ConsensusTracker::new(
            config.consensus_settings(),
            config.track_times(),
            config.run.agent_reporter,
        ));

        let mut schedule = Schedule::default();
        schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        schedule.add_systems((capture_belief_snapshot, update_beliefs, track_consensus).chain());

        let mut simulation = Self {
            world,
            schedule,
            parameters,
            seed,
            stop_on_consensus: config.consensus.stop_on_consensus,
        };

        let (means, spreads) = simulation.agent_stats();
        simulation
            .world
            .resource_mut::<ConsensusTracker>()
            .observe_initial(&means, &spreads);
        Ok(simulation)
    }

    pub fn tick(&self) -> u64 {
        self.world.resource::<SimulationClock>().tick
    }

    pub fn max_ticks(&self) -> u64 {
        self.world.resource::<SimulationClock>().max_ticks
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn network(&self) -> &Network {
        self.world.resource::<Network>()
    }

    pub fn belief_space(&self) -> &BeliefSpace {
        self.world.resource::<BeliefSpace>()
    }

    pub fn tracker(&self) -> &ConsensusTracker {
        self.world.resource::<ConsensusTracker>()
    }

    pub fn update_stats(&self) -> UpdateStats {
        *self.world.resource::<UpdateStats>()
    }

    /// Advance one tick. Returns the first fatal error raised by any agent.
    pub fn step(&mut self) -> SimResult<()> {
        self.world.resource_mut::<SimulationClock>().tick += 1;
        self.schedule.run(&mut self.world);

        match self.world.resource_mut::<RunFault>().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Step until the horizon, or until consensus is confirmed when early
    /// stopping is enabled.
    pub fn run_to_end(&mut self) -> SimResult<()> {
        while self.tick() < self.max_ticks() {
            self.step()?;
            if self.stop_on_consensus && self.tracker().is_confirmed() {
                debug!(tick = self.tick(), "stopping early on consensus");
                break;
            }
        }
        Ok(())
    }

    pub fn run(mut self) -> SimResult<RunSummary> {
        self.run_to_end()?;
        Ok(self.into_summary())
    }

    /// Close the consensus record and build the run summary.
    pub fn into_summary(mut self) -> RunSummary {
        let ticks_run = self.tick();
        let fallbacks = self.update_stats().fallbacks;

        let mut tracker = self.world.resource_mut::<ConsensusTracker>();
        let outcome = tracker.finish();
        let trajectory = tracker.take_trajectory();

        RunSummary {
            run_id: generate_run_id(&self.parameters, self.seed),
            parameters: self.parameters,
            seed: self.seed,
            consensus_time: outcome.consensus_time,
            consensus_opinion: outcome.consensus_opinion,
            final_mean: outcome.final_mean,
            final_sigma: outcome.final_sigma,
            ticks_run,
            degenerate_fallbacks: fallbacks,
            trajectory,
        }
    }

    /// Mean beliefs and spreads of all agents, in agent index order.
    pub fn agent_stats(&mut self) -> (Vec<f64>, Vec<f64>) {
        let mut query = self.world.query::<(&AgentIndex, &MeanBelief, &BeliefSpread)>();
        let mut rows: Vec<(usize, f64, f64)> = query
            .iter(&self.world)
            .map(|(index, mean, spread)| (index.0, mean.0, spread.0))
            .collect();
        rows.sort_unstable_by_key(|row| row.0);

        rows.into_iter().map(|(_, mean, spread)| (mean, spread)).unzip()
    }

    /// Belief densities of all agents, in agent index order.
    pub fn densities(&mut self) -> Vec<Vec<f64>> {
        let mut query = self.world.query::<(&AgentIndex, &BeliefDensity)>();
        let mut rows: Vec<(usize, Vec<f64>)> = query
            .iter(&self.world)
            .map(|(index, density)| (index.0, density.0.clone()))
            .collect();
        rows.sort_unstable_by_key(|row| row.0);
        rows.into_iter().map(|(_, density)| density).collect()
    }
}

/// Build and run one simulation to completion.
pub fn run_single(config: &SimConfig, seed: u64) -> SimResult<RunSummary> {
    let summary = Simulation::new(config, seed)?.run()?;
    info!(
        run_id = %summary.run_id,
        consensus_time = ?summary.consensus_time,
        final_sigma = summary.final_sigma,
        "run complete"
    );
    Ok(summary)
}
