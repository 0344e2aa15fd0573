//! Seed exploration and run reports.

use crate::SimulatorConfig;
use lamport_mutex::MutexMode;
use lamport_simulation::{ClusterReport, SimulationRunner};
use serde::Serialize;
use tracing::{info, warn};

/// A seed whose run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub error: String,
}

/// Outcome of exploring a range of seeds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExploreReport {
    pub workers: usize,
    pub use_lock: bool,
    pub mode: MutexMode,
    pub seeds_run: u64,
    pub total_steps: u64,
    pub total_messages: u64,
    /// Most steps any single seed needed.
    pub max_steps: u64,
    pub failures: Vec<SeedFailure>,
}

impl ExploreReport {
    /// Check that every seed terminated without violating mutual exclusion.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Print a human-readable summary to stdout.
    pub fn print(&self) {
        println!(
            "Explored {} seeds ({} workers, lock: {}, mode: {})",
            self.seeds_run, self.workers, self.use_lock, self.mode
        );
        println!(
            "  Steps:    {} total, {} max per seed",
            self.total_steps, self.max_steps
        );
        println!("  Messages: {}", self.total_messages);
        if self.failures.is_empty() {
            println!("  Result:   no violations");
        } else {
            println!("  Result:   {} failing seeds", self.failures.len());
            for failure in &self.failures {
                println!("    seed {}: {}", failure.seed, failure.error);
            }
        }
    }
}

/// Run the deterministic runner for `config.seeds` seeds starting at
/// `config.seed`.
pub fn explore(config: &SimulatorConfig) -> ExploreReport {
    let mut report = ExploreReport {
        workers: config.workers,
        use_lock: config.use_lock,
        mode: config.mode,
        ..Default::default()
    };

    for seed in config.seed..config.seed.saturating_add(config.seeds) {
        let result = SimulationRunner::new(config.to_simulation_config(seed))
            .and_then(|mut runner| runner.run());
        report.seeds_run += 1;

        match result {
            Ok(stats) => {
                report.total_steps += stats.steps;
                report.total_messages += stats.messages_delivered;
                report.max_steps = report.max_steps.max(stats.steps);
            }
            Err(e) => {
                warn!(seed, error = %e, "seed failed");
                report.failures.push(SeedFailure {
                    seed,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        seeds = report.seeds_run,
        failures = report.failures.len(),
        "exploration finished"
    );
    report
}

/// Print a human-readable summary of a threaded run to stdout.
pub fn print_cluster(report: &ClusterReport) {
    println!(
        "Ran {} workers (lock: {}, mode: {}) in {} ms",
        report.workers, report.use_lock, report.mode, report.elapsed_ms
    );
    for process in &report.processes {
        println!(
            "  {}: {} lock entries, {} sent, {} received, clock {}",
            process.process,
            process.lock_entries,
            process.sent,
            process.received,
            process.final_clock
        );
    }
    println!(
        "  Max concurrent units of work: {} ({} overlaps)",
        report.max_occupancy, report.overlaps
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_explore_counts_seeds() {
        let config = SimulatorConfig::new(2)
            .with_lock(true)
            .with_seed(5)
            .with_seeds(3);
        let report = explore(&config);

        assert_eq!(report.seeds_run, 3);
        assert!(report.is_clean());
        assert!(report.max_steps > 0);
        assert!(report.total_steps >= report.max_steps);
    }

    #[traced_test]
    #[test]
    fn test_explore_reports_stalls() {
        let mut config = SimulatorConfig::new(2).with_lock(true).with_seeds(2);
        config.max_steps = 5;
        let report = explore(&config);

        assert_eq!(report.failures.len(), 2);
        assert!(report.failures[0].error.contains("no termination"));
        assert!(logs_contain("seed failed"));
    }
}
