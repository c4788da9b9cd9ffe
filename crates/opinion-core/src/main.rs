//! Opinion Dynamics Simulator
//!
//! Command line entry point: single runs, perception-weight sweeps and the
//! default configuration.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opinion_core::config::NetworkConfig;
use opinion_core::output::{read_adjacency, write_aggregates, write_summary_to_dir, SweepLogger};
use opinion_core::setup::Network;
use opinion_core::{
    default_config_toml, run_single, run_sweep, Resolution, SimConfig, Simulation, SweepPlan,
};

/// Command line arguments for the simulator
#[derive(Parser, Debug)]
#[command(name = "opinion_sim")]
#[command(about = "In-group bias opinion dynamics on two-group small-world networks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single simulation and write its summary
    Run(RunArgs),
    /// Sweep the perception weights over a resolution grid
    Batch(BatchArgs),
    /// Print the default configuration as TOML
    DefaultConfig,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed (overrides the configuration)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of ticks to simulate (overrides the configuration)
    #[arg(long)]
    ticks: Option<u64>,

    /// JSON adjacency matrix to use instead of generating a network
    #[arg(long)]
    adjacency: Option<PathBuf>,

    /// Record per-agent means and spreads in every snapshot
    #[arg(long)]
    agent_reporter: bool,

    /// Directory for the summary file
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Number of agents
    n: usize,
    /// Mean degree
    k: usize,
    /// Expected in-group degree
    k_in: usize,
    /// Expected out-group degree
    k_out: usize,
    /// Initial bias between the groups
    #[arg(allow_negative_numbers = true)]
    delta_0: f64,
    /// Diffusion coefficient
    kappa: f64,
    /// Probability of interacting instead of diffusing
    communication_frequency: f64,
    /// Width of the initial beliefs
    sig_op_0: f64,
    /// Rewiring probability
    p_rewire: f64,
    /// Number of ticks
    ticks: u64,
    /// Perception grid: high, low or scenarios
    resolution: Resolution,
    /// First seed
    seed: u64,

    /// Number of consecutive seeds per grid point
    #[arg(long, default_value_t = 1)]
    seeds: u64,

    /// TOML configuration for the settings not given on the command line
    #[arg(long)]
    config: Option<PathBuf>,

    /// Record per-agent values (disables early stopping on consensus)
    #[arg(long)]
    agent_reporter: bool,

    /// Directory for the sweep log and aggregates
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opinion_sim=info,opinion_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Cli::parse().command {
        Command::Run(args) => run(args),
        Command::Batch(args) => batch(args),
        Command::DefaultConfig => {
            print!("{}", default_config_toml());
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SimConfig, Box<dyn Error>> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            Ok(SimConfig::from_file(path)?)
        }
        None => Ok(SimConfig::default()),
    }
}

fn run(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.run.seed = seed;
    }
    if let Some(ticks) = args.ticks {
        config.run.ticks = ticks;
    }
    config.run.agent_reporter |= args.agent_reporter;

    let seed = config.run.seed;
    info!(seed, ticks = config.run.ticks, "starting run");

    let summary = match &args.adjacency {
        Some(path) => {
            let network = Network::from_adjacency(&read_adjacency(path)?)?;
            info!(agents = network.n_agents(), edges = network.edge_count(), "imported network");
            Simulation::with_network(&config, seed, network)?.run()?
        }
        None => run_single(&config, seed)?,
    };

    let path = write_summary_to_dir(&summary, &args.output_dir)?;
    info!(
        path = %path.display(),
        consensus_time = ?summary.consensus_time,
        consensus_opinion = summary.consensus_opinion,
        "wrote summary"
    );
    Ok(())
}

fn batch(args: BatchArgs) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(args.config.as_deref())?;
    config.network = NetworkConfig {
        n_agents: args.n,
        k: args.k,
        k_in: args.k_in,
        k_out: args.k_out,
        p_rewire: args.p_rewire,
    };
    config.belief.delta_0 = args.delta_0;
    config.belief.sig_op_0 = args.sig_op_0;
    config.dynamics.kappa = args.kappa;
    config.dynamics.communication_frequency = args.communication_frequency;
    config.run.ticks = args.ticks;
    config.run.agent_reporter = args.agent_reporter;
    config.consensus.stop_on_consensus = !args.agent_reporter;

    let plan = SweepPlan::from_resolution(
        args.resolution,
        vec![args.p_rewire],
        SweepPlan::seed_range(args.seed, args.seeds),
    );
    info!(resolution = %args.resolution, runs = plan.len(), "starting batch");

    let report = run_sweep(&config, &plan);

    fs::create_dir_all(&args.output_dir)?;
    let stem = format!(
        "{}_{}_seed-{}",
        config.parameter_set().file_stem(),
        args.resolution,
        args.seed
    );

    let log_path = args.output_dir.join(format!("{}.jsonl", stem));
    let mut logger = SweepLogger::new(&log_path)?;
    logger.log_batch(&report.records)?;
    logger.flush()?;

    let aggregates_path = args.output_dir.join(format!("{}_aggregates.json", stem));
    write_aggregates(&report.aggregates(), &aggregates_path)?;

    info!(
        records = logger.record_count(),
        failures = report.failures().count(),
        log = %log_path.display(),
        aggregates = %aggregates_path.display(),
        "batch complete"
    );
    Ok(())
}
