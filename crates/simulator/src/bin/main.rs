//! Lamport Mutex Simulator CLI
//!
//! Runs a coordinator and a set of workers that share a critical section,
//! either on real threads or under the deterministic step runner.

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use lamport_mutex::MutexMode;
use lamport_simulation::run_cluster;
use lamport_simulator::report::print_cluster;
use lamport_simulator::{explore, logging, SimulatorConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lamport-sim")]
#[command(about = "Distributed mutual exclusion over Lamport clocks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Number of worker processes
    #[arg(short = 'p', long)]
    workers: Option<usize>,

    /// Guard each unit of work with the distributed lock
    #[arg(long)]
    mutexl: bool,

    /// Lock protocol (ricart-agrawala, lamport-queue)
    #[arg(long, value_parser = parse_mode)]
    mode: Option<MutexMode>,

    /// TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write every event to this file
    #[arg(long)]
    events_log: Option<PathBuf>,

    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a cluster with one thread per process
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Microseconds to sleep after an idle polling round
        #[arg(long)]
        poll_interval_us: Option<u64>,
    },

    /// Run the deterministic runner over a range of seeds
    Explore {
        #[command(flatten)]
        common: CommonArgs,

        /// Number of seeds to run
        #[arg(long)]
        seeds: Option<u64>,

        /// First seed
        #[arg(long)]
        seed: Option<u64>,

        /// Step budget per seed
        #[arg(long)]
        max_steps: Option<u64>,
    },
}

fn parse_mode(s: &str) -> Result<MutexMode, String> {
    match s.to_lowercase().as_str() {
        "ricart-agrawala" | "ra" => Ok(MutexMode::RicartAgrawala),
        "lamport-queue" | "lamport" | "queue" => Ok(MutexMode::LamportQueue),
        _ => Err(format!("Unknown lock mode: {}", s)),
    }
}

/// Load the config file (if any) and apply flag overrides.
fn resolve(common: &CommonArgs) -> anyhow::Result<SimulatorConfig> {
    let mut config = match &common.config {
        Some(path) => SimulatorConfig::load(path)?,
        None => SimulatorConfig::default(),
    };
    if let Some(workers) = common.workers {
        config.workers = workers;
    }
    if common.mutexl {
        config.use_lock = true;
    }
    if let Some(mode) = common.mode {
        config.mode = mode;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            common,
            poll_interval_us,
        } => {
            let mut config = resolve(&common)?;
            if let Some(us) = poll_interval_us {
                config.poll_interval_us = us;
            }
            config.validate()?;
            let _guard = logging::init(common.debug, common.events_log.as_deref())?;

            let report = run_cluster(&config.to_cluster_config())?;
            if common.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_cluster(&report);
            }

            if config.use_lock && !report.is_exclusive() {
                bail!("{} overlapping units of work under the lock", report.overlaps);
            }
        }

        Commands::Explore {
            common,
            seeds,
            seed,
            max_steps,
        } => {
            let mut config = resolve(&common)?;
            if let Some(seeds) = seeds {
                config.seeds = seeds;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }
            if let Some(max_steps) = max_steps {
                config.max_steps = max_steps;
            }
            config.validate()?;
            let _guard = logging::init(common.debug, common.events_log.as_deref())?;

            let report = explore(&config);
            if common.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }

            if !report.is_clean() {
                bail!("{} of {} seeds failed", report.failures.len(), report.seeds_run);
            }
        }
    }

    Ok(())
}
