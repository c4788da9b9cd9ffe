//! Parameter Sweeps
//!
//! Runs every `(alpha_in, alpha_out, p_rewire, seed)` combination of a plan on
//! the rayon pool. Each run owns its world and RNG; a failed run becomes a
//! failure record and never stops its siblings.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use tracing::{info, warn};

use opinion_events::{generate_run_id, ParameterKey, RunFailure, SweepAggregate, SweepRecord};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::experiment::simulation::run_single;

/// Perception weights of the high-resolution grid
pub const HIGH_RESOLUTION_ALPHAS: [f64; 11] =
    [0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 0.99];

/// Perception weights of the low-resolution grid
pub const LOW_RESOLUTION_ALPHAS: [f64; 3] = [0.25, 0.5, 0.75];

/// A named canonical society
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    pub name: &'static str,
    pub alpha_in: f64,
    pub alpha_out: f64,
}

pub const SCENARIOS: [Scenario; 4] = [
    Scenario {
        name: "unbiased-weak",
        alpha_in: 0.25,
        alpha_out: 0.25,
    },
    Scenario {
        name: "unbiased-strong",
        alpha_in: 0.75,
        alpha_out: 0.75,
    },
    Scenario {
        name: "biased",
        alpha_in: 0.75,
        alpha_out: 0.25,
    },
    Scenario {
        name: "strongly-biased",
        alpha_in: 0.99,
        alpha_out: 0.25,
    },
];

/// Which perception pairs a batch covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    High,
    Low,
    Scenarios,
}

impl Resolution {
    pub fn alpha_pairs(self) -> Vec<(f64, f64)> {
        match self {
            Resolution::High => alpha_grid(&HIGH_RESOLUTION_ALPHAS),
            Resolution::Low => alpha_grid(&LOW_RESOLUTION_ALPHAS),
            Resolution::Scenarios => SCENARIOS.iter().map(|s| (s.alpha_in, s.alpha_out)).collect(),
        }
    }
}

impl FromStr for Resolution {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Resolution::High),
            "low" => Ok(Resolution::Low),
            "scenarios" => Ok(Resolution::Scenarios),
            other => Err(SimError::InvalidParams(format!(
                "unknown resolution '{}' (expected high, low or scenarios)",
                other
            ))),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::High => write!(f, "high"),
            Resolution::Low => write!(f, "low"),
            Resolution::Scenarios => write!(f, "scenarios"),
        }
    }
}

/// All pairs `(alpha_in, alpha_out)` from `values` with `alpha_out <= alpha_in`.
pub fn alpha_grid(values: &[f64]) -> Vec<(f64, f64)> {
    values
        .iter()
        .flat_map(|&alpha_in| {
            values
                .iter()
                .filter(move |&&alpha_out| alpha_out <= alpha_in)
                .map(move |&alpha_out| (alpha_in, alpha_out))
        })
        .collect()
}

/// One combination of a sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepJob {
    pub alpha_in: f64,
    pub alpha_out: f64,
    pub p_rewire: f64,
    pub seed: u64,
}

/// Cartesian grid of perception pairs, rewiring probabilities and seeds
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    pub alpha_pairs: Vec<(f64, f64)>,
    pub p_rewires: Vec<f64>,
    pub seeds: Vec<u64>,
}

impl SweepPlan {
    pub fn new(alpha_pairs: Vec<(f64, f64)>, p_rewires: Vec<f64>, seeds: Vec<u64>) -> Self {
        Self {
            alpha_pairs,
            p_rewires,
            seeds,
        }
    }

    pub fn from_resolution(resolution: Resolution, p_rewires: Vec<f64>, seeds: Vec<u64>) -> Self {
        Self::new(resolution.alpha_pairs(), p_rewires, seeds)
    }

    /// `count` consecutive seeds starting at `first`.
    pub fn seed_range(first: u64, count: u64) -> Vec<u64> {
        (first..first.saturating_add(count.max(1))).collect()
    }

    /// Jobs in grid order: perception pair, then rewiring, then seed.
    pub fn jobs(&self) -> Vec<SweepJob> {
        let mut jobs = Vec::with_capacity(self.len());
        for &(alpha_in, alpha_out) in &self.alpha_pairs {
            for &p_rewire in &self.p_rewires {
                for &seed in &self.seeds {
                    jobs.push(SweepJob {
                        alpha_in,
                        alpha_out,
                        p_rewire,
                        seed,
                    });
                }
            }
        }
        jobs
    }

    pub fn len(&self) -> usize {
        self.alpha_pairs.len() * self.p_rewires.len() * self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Records of every job of a sweep, in plan order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub records: Vec<SweepRecord>,
}

impl SweepReport {
    pub fn completed(&self) -> impl Iterator<Item = &opinion_events::RunSummary> {
        self.records.iter().filter_map(|r| r.summary())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunFailure> {
        self.records.iter().filter_map(|r| match r {
            SweepRecord::Failed(failure) => Some(failure),
            SweepRecord::Completed(_) => None,
        })
    }

    pub fn aggregates(&self) -> Vec<SweepAggregate> {
        aggregate_records(&self.records)
    }
}

/// Run a single job; errors become failure records.
pub fn run_job(base: &SimConfig, job: &SweepJob) -> SweepRecord {
    let config = base.with_sweep_point(job.alpha_in, job.alpha_out, job.p_rewire);
    match run_single(&config, job.seed) {
        Ok(summary) => SweepRecord::Completed(summary),
        Err(error) => {
            let parameters = config.parameter_set();
            let run_id = generate_run_id(&parameters, job.seed);
            warn!(run_id = %run_id, error = %error, "run failed");
            SweepRecord::Failed(RunFailure {
                run_id,
                parameters,
                seed: job.seed,
                kind: error.kind(),
                reason: error.to_string(),
            })
        }
    }
}

/// Run every job of `plan` on the rayon pool.
pub fn run_sweep(base: &SimConfig, plan: &SweepPlan) -> SweepReport {
    let jobs = plan.jobs();
    info!(runs = jobs.len(), "starting sweep");

    let records: Vec<SweepRecord> = jobs.par_iter().map(|job| run_job(base, job)).collect();
    let report = SweepReport { records };

    info!(
        completed = report.completed().count(),
        failed = report.failures().count(),
        "sweep finished"
    );
    report
}

#[derive(Default)]
struct Accumulator {
    runs: usize,
    failures: usize,
    consensus_times: Vec<u64>,
    final_sigmas: Vec<f64>,
}

fn mean_of(values: impl ExactSizeIterator<Item = f64>) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        None
    } else {
        Some(values.sum::<f64>() / n as f64)
    }
}

/// Per `(alpha_in, alpha_out, p_rewire)` statistics. Failed runs are counted
/// but excluded from every average.
pub fn aggregate_records(records: &[SweepRecord]) -> Vec<SweepAggregate> {
    let mut groups: BTreeMap<ParameterKey, Accumulator> = BTreeMap::new();

    for record in records {
        let acc = groups.entry(record.parameters().key()).or_default();
        acc.runs += 1;
        match record {
            SweepRecord::Completed(summary) => {
                acc.final_sigmas.push(summary.final_sigma);
                if let Some(time) = summary.consensus_time {
                    acc.consensus_times.push(time);
                }
            }
            SweepRecord::Failed(_) => acc.failures += 1,
        }
    }

    groups
        .into_iter()
        .map(|(key, acc)| {
            let completed = acc.runs - acc.failures;
            let reached = acc.consensus_times.len();
            SweepAggregate {
                alpha_in: key.alpha_in(),
                alpha_out: key.alpha_out(),
                p_rewire: key.p_rewire(),
                runs: acc.runs,
                failures: acc.failures,
                consensus_reached: reached,
                consensus_fraction: if completed == 0 {
                    0.0
                } else {
                    reached as f64 / completed as f64
                },
                mean_consensus_time: mean_of(acc.consensus_times.iter().map(|&t| t as f64)),
                mean_final_sigma: mean_of(acc.final_sigmas.iter().copied()),
            }
        })
        .collect()
}
