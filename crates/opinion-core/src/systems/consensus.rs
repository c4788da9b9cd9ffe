//! Consensus Tracking
//!
//! Watches the population's mean opinions after every tick and records when
//! their spread falls, and stays, below the consensus threshold.
//!
//! A tick whose population standard deviation is below the threshold starts a
//! candidate. The candidate is confirmed once the spread stays below the
//! threshold for `confirmation_ticks` consecutive ticks (counting the first);
//! any rise above the threshold cancels it. The confirmed consensus time is
//! the candidate's tick. Once confirmed the record is never changed.

use std::collections::BTreeSet;

use bevy_ecs::prelude::*;
use opinion_events::TrajectoryPoint;

use crate::components::agent::{AgentIndex, BeliefSpread, MeanBelief};
use crate::systems::update::RunFault;
use crate::SimulationClock;

/// Default population standard deviation below which opinions count as agreeing
pub const DEFAULT_SIGMA_THRESHOLD: f64 = 0.01;
/// Default number of consecutive ticks below the threshold needed to confirm
pub const DEFAULT_CONFIRMATION_TICKS: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusSettings {
    pub sigma_threshold: f64,
    pub confirmation_ticks: u64,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            sigma_threshold: DEFAULT_SIGMA_THRESHOLD,
            confirmation_ticks: DEFAULT_CONFIRMATION_TICKS,
        }
    }
}

/// Tick and population mean at which consensus was first reached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusRecord {
    pub tick: u64,
    pub opinion: f64,
}

/// Final consensus statistics of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusOutcome {
    pub consensus_time: Option<u64>,
    /// Mean opinion at consensus, or the final mean when never reached
    pub consensus_opinion: f64,
    pub final_mean: f64,
    pub final_sigma: f64,
}

/// Mean and population standard deviation (no Bessel correction).
pub fn population_stats(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Per-run consensus state
#[derive(Resource, Debug, Clone)]
pub struct ConsensusTracker {
    settings: ConsensusSettings,
    track_times: BTreeSet<u64>,
    record_agents: bool,
    overall_mean: f64,
    overall_sigma: f64,
    last_tick: Option<u64>,
    candidate: Option<ConsensusRecord>,
    streak: u64,
    consensus: Option<ConsensusRecord>,
    trajectory: Vec<TrajectoryPoint>,
}

impl ConsensusTracker {
    pub fn new(
        settings: ConsensusSettings,
        track_times: impl IntoIterator<Item = u64>,
        record_agents: bool,
    ) -> Self {
        Self {
            settings,
            track_times: track_times.into_iter().collect(),
            record_agents,
            overall_mean: 0.0,
            overall_sigma: 0.0,
            last_tick: None,
            candidate: None,
            streak: 0,
            consensus: None,
            trajectory: Vec::new(),
        }
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    pub fn consensus(&self) -> Option<ConsensusRecord> {
        self.consensus
    }

    pub fn is_confirmed(&self) -> bool {
        self.consensus.is_some()
    }

    pub fn trajectory(&self) -> &[TrajectoryPoint] {
        &self.trajectory
    }

    pub fn take_trajectory(&mut self) -> Vec<TrajectoryPoint> {
        std::mem::take(&mut self.trajectory)
    }

    /// Record the state before the first tick. Updates the statistics and the
    /// trajectory but never starts a consensus candidate.
    pub fn observe_initial(&mut self, means: &[f64], spreads: &[f64]) {
        self.record_stats(0, means, spreads);
    }

    /// Record the state after `tick`. Returns the consensus record when this
    /// tick confirmed it.
    pub fn observe(
        &mut self,
        tick: u64,
        means: &[f64],
        spreads: &[f64],
    ) -> Option<ConsensusRecord> {
        self.record_stats(tick, means, spreads);

        if self.consensus.is_some() {
            return None;
        }

        if self.overall_sigma < self.settings.sigma_threshold {
            let candidate = *self.candidate.get_or_insert(ConsensusRecord {
                tick,
                opinion: self.overall_mean,
            });
            self.streak += 1;
            if self.streak >= self.settings.confirmation_ticks.max(1) {
                self.consensus = Some(candidate);
                tracing::debug!(
                    tick = candidate.tick,
                    opinion = candidate.opinion,
                    "consensus confirmed"
                );
                return Some(candidate);
            }
        } else {
            self.candidate = None;
            self.streak = 0;
        }
        None
    }

    /// Close the run. A candidate still below the threshold at the end of the
    /// horizon counts as reached.
    pub fn finish(&mut self) -> ConsensusOutcome {
        if self.consensus.is_none() {
            self.consensus = self.candidate.take();
        }

        ConsensusOutcome {
            consensus_time: self.consensus.map(|c| c.tick),
            consensus_opinion: self
                .consensus
                .map_or(self.overall_mean, |c| c.opinion),
            final_mean: self.overall_mean,
            final_sigma: self.overall_sigma,
        }
    }

    fn record_stats(&mut self, tick: u64, means: &[f64], spreads: &[f64]) {
        let (mean, sigma) = population_stats(means);
        self.overall_mean = mean;
        self.overall_sigma = sigma;
        self.last_tick = Some(tick);

        if self.track_times.contains(&tick) {
            let point = TrajectoryPoint::new(tick, mean, sigma);
            let point = if self.record_agents {
                point.with_agents(means.to_vec(), spreads.to_vec())
            } else {
                point
            };
            self.trajectory.push(point);
        }
    }
}

/// System: feed the post-tick means and spreads (in agent order) to the tracker
pub fn track_consensus(
    clock: Res<SimulationClock>,
    fault: Res<RunFault>,
    mut tracker: ResMut<ConsensusTracker>,
    query: Query<(&AgentIndex, &MeanBelief, &BeliefSpread)>,
) {
    if fault.is_set() {
        return;
    }

    let mut rows: Vec<(usize, f64, f64)> = query
        .iter()
        .map(|(index, mean, spread)| (index.0, mean.0, spread.0))
        .collect();
    rows.sort_unstable_by_key(|row| row.0);

    let means: Vec<f64> = rows.iter().map(|row| row.1).collect();
    let spreads: Vec<f64> = rows.iter().map(|row| row.2).collect();
    tracker.observe(clock.tick, &means, &spreads);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPREAD_OUT: [f64; 4] = [-0.5, -0.1, 0.2, 0.6];
    const AGREEING: [f64; 4] = [0.301, 0.3, 0.299, 0.3];

    fn tracker(confirmation_ticks: u64) -> ConsensusTracker {
        ConsensusTracker::new(
            ConsensusSettings {
                sigma_threshold: 0.01,
                confirmation_ticks,
            },
            [0, 10, 50],
            false,
        )
    }

    #[test]
    fn test_population_stats_uses_population_std() {
        let (mean, sigma) = population_stats(&[1.0, 3.0]);
        assert_eq!(mean, 2.0);
        assert_eq!(sigma, 1.0);
        assert_eq!(population_stats(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_consensus_time_is_first_tick_below_threshold() {
        let mut tracker = tracker(20);
        let spreads = [0.1; 4];
        tracker.observe_initial(&SPREAD_OUT, &spreads);

        let mut confirmed_at = None;
        for tick in 1..=100 {
            let means = if tick < 37 { SPREAD_OUT } else { AGREEING };
            if let Some(record) = tracker.observe(tick, &means, &spreads) {
                confirmed_at = Some(tick);
                assert_eq!(record.tick, 37);
            }
        }

        assert_eq!(confirmed_at, Some(56));
        let outcome = tracker.finish();
        assert_eq!(outcome.consensus_time, Some(37));
        assert!((outcome.consensus_opinion - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_consensus_never_moves_once_confirmed() {
        let mut tracker = tracker(3);
        let spreads = [0.1; 4];
        for tick in 1..=5 {
            tracker.observe(tick, &AGREEING, &spreads);
        }
        for tick in 6..=10 {
            tracker.observe(tick, &SPREAD_OUT, &spreads);
        }
        for tick in 11..=20 {
            tracker.observe(tick, &AGREEING, &spreads);
        }

        let outcome = tracker.finish();
        assert_eq!(outcome.consensus_time, Some(1));
    }

    #[test]
    fn test_rise_cancels_candidate() {
        let mut tracker = tracker(5);
        let spreads = [0.1; 4];
        for tick in 1..=3 {
            tracker.observe(tick, &AGREEING, &spreads);
        }
        tracker.observe(4, &SPREAD_OUT, &spreads);
        for tick in 5..=12 {
            tracker.observe(tick, &AGREEING, &spreads);
        }

        assert_eq!(tracker.consensus().map(|c| c.tick), Some(5));
    }

    #[test]
    fn test_unreached_consensus_reports_final_mean() {
        let mut tracker = tracker(5);
        let spreads = [0.1; 4];
        for tick in 1..=30 {
            tracker.observe(tick, &SPREAD_OUT, &spreads);
        }

        let outcome = tracker.finish();
        assert_eq!(outcome.consensus_time, None);
        assert!((outcome.consensus_opinion - 0.05).abs() < 1e-12);
        assert_eq!(outcome.final_mean, outcome.consensus_opinion);
        assert!(outcome.final_sigma > 0.01);
    }

    #[test]
    fn test_candidate_at_horizon_end_counts() {
        let mut tracker = tracker(20);
        let spreads = [0.1; 4];
        for tick in 1..=10 {
            tracker.observe(tick, &SPREAD_OUT, &spreads);
        }
        for tick in 11..=15 {
            tracker.observe(tick, &AGREEING, &spreads);
        }

        assert!(!tracker.is_confirmed());
        assert_eq!(tracker.finish().consensus_time, Some(11));
    }

    #[test]
    fn test_trajectory_follows_track_times() {
        let mut tracker = tracker(20);
        let spreads = [0.1; 4];
        tracker.observe_initial(&SPREAD_OUT, &spreads);
        for tick in 1..=60 {
            tracker.observe(tick, &SPREAD_OUT, &spreads);
        }

        let ticks: Vec<u64> = tracker.trajectory().iter().map(|p| p.tick).collect();
        assert_eq!(ticks, vec![0, 10, 50]);
        assert!(tracker.trajectory()[0].mean_beliefs.is_none());
    }

    #[test]
    fn test_agent_reporter_records_per_agent_values() {
        let mut tracker = ConsensusTracker::new(ConsensusSettings::default(), [0], true);
        tracker.observe_initial(&SPREAD_OUT, &[0.1, 0.2, 0.3, 0.4]);

        let point = &tracker.trajectory()[0];
        assert_eq!(point.mean_beliefs.as_deref(), Some(&SPREAD_OUT[..]));
        assert_eq!(point.spreads.as_deref(), Some(&[0.1, 0.2, 0.3, 0.4][..]));
    }

    #[test]
    fn test_initial_state_never_starts_candidate() {
        let mut tracker = tracker(1);
        tracker.observe_initial(&AGREEING, &[0.1; 4]);
        assert_eq!(tracker.finish().consensus_time, None);
    }
}
