//! Sweep driver tests: grid coverage, failure isolation and aggregation.

use opinion_core::output::{read_sweep, write_aggregates, SweepLogger};
use opinion_core::{run_sweep, Resolution, SimConfig, SweepPlan};
use opinion_events::{FailureKind, SweepAggregate, SweepRecord};

fn base_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.network.n_agents = 20;
    config.network.k = 6;
    config.network.k_in = 5;
    config.network.k_out = 1;
    config.run.ticks = 40;
    config
}

#[test]
fn test_scenario_sweep_covers_grid() {
    let plan = SweepPlan::from_resolution(Resolution::Scenarios, vec![0.0], vec![1, 2]);
    let report = run_sweep(&base_config(), &plan);

    assert_eq!(report.records.len(), 8);
    assert_eq!(report.failures().count(), 0);

    let aggregates = report.aggregates();
    assert_eq!(aggregates.len(), 4);
    assert!(aggregates.iter().all(|a| a.runs == 2 && a.failures == 0));
    assert!(aggregates.iter().all(|a| a.mean_final_sigma.is_some()));
}

#[test]
fn test_failing_combination_does_not_abort_siblings() {
    // (0.2, 0.6) violates alpha_out <= alpha_in; 1.5 is not a probability
    let plan = SweepPlan::new(vec![(0.5, 0.25), (0.2, 0.6)], vec![0.0, 1.5], vec![11]);
    let report = run_sweep(&base_config(), &plan);

    assert_eq!(report.records.len(), 4);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 3);
    assert_eq!(report.completed().count(), 1);

    let completed = report.completed().next().unwrap();
    assert_eq!(completed.parameters.alpha_in, 0.5);
    assert_eq!(completed.parameters.p_rewire, 0.0);

    assert!(failures
        .iter()
        .any(|f| f.kind == FailureKind::InvalidTopology && f.parameters.alpha_in == 0.5));
    assert!(failures
        .iter()
        .any(|f| f.kind == FailureKind::InvalidParameters && f.parameters.p_rewire == 0.0));

    let aggregates = report.aggregates();
    let ok = aggregates
        .iter()
        .find(|a| a.alpha_in == 0.5 && a.p_rewire == 0.0)
        .unwrap();
    assert_eq!(ok.runs, 1);
    assert_eq!(ok.failures, 0);
    assert!(ok.mean_final_sigma.is_some());

    let failed: Vec<&SweepAggregate> = aggregates.iter().filter(|a| a.failures > 0).collect();
    assert_eq!(failed.len(), 3);
    assert!(failed.iter().all(|a| a.mean_final_sigma.is_none()));
}

#[test]
fn test_sweep_output_round_trip() {
    let plan = SweepPlan::new(vec![(0.75, 0.25)], vec![0.0], vec![1, 2, 3]);
    let report = run_sweep(&base_config(), &plan);

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("sweep.jsonl");
    {
        let mut logger = SweepLogger::new(&log_path).unwrap();
        logger.log_batch(&report.records).unwrap();
        assert_eq!(logger.record_count(), 3);
    }

    let records: Vec<SweepRecord> = read_sweep(&log_path).unwrap();
    assert_eq!(records, report.records);

    let aggregates_path = dir.path().join("aggregates.json");
    write_aggregates(&report.aggregates(), &aggregates_path).unwrap();
    assert!(aggregates_path.exists());
}
