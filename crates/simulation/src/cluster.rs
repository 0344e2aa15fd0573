//! Threaded cluster runner.

use crate::{CriticalSectionMonitor, MemoryFabric, OccupancyProbe, SimulationError};
use crossbeam::channel;
use lamport_mutex::MutexMode;
use lamport_node::{IterationWorkload, NodeConfig, NodeError, Process, ProcessReport, Workload};
use lamport_types::{ProcessId, Topology};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for a threaded run.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Number of workers; the coordinator is added on top.
    pub workers: usize,

    /// Per-process configuration shared by every process.
    pub node: NodeConfig,
}

impl ClusterConfig {
    /// Create a config for `workers` workers with default node settings.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            node: NodeConfig::default(),
        }
    }

    /// Set the per-process configuration.
    pub fn with_node(mut self, node: NodeConfig) -> Self {
        self.node = node;
        self
    }

    /// Total number of processes including the coordinator.
    pub fn process_count(&self) -> usize {
        self.workers + 1
    }
}

/// Outcome of a threaded run.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterReport {
    pub workers: usize,
    pub use_lock: bool,
    pub mode: MutexMode,
    /// One report per process, ascending id.
    pub processes: Vec<ProcessReport>,
    /// Most units of work observed in progress at once.
    pub max_occupancy: usize,
    pub overlaps: u64,
    /// Process performing each unit of work, in order.
    pub entry_order: Vec<ProcessId>,
    pub elapsed_ms: u64,
}

impl ClusterReport {
    /// Check that no two units of work ever overlapped.
    pub fn is_exclusive(&self) -> bool {
        self.overlaps == 0
    }

    /// Total critical-section acquisitions across all workers.
    pub fn lock_entries(&self) -> u64 {
        self.processes.iter().map(|p| p.lock_entries).sum()
    }
}

type Outcome = (ProcessId, thread::Result<Result<ProcessReport, NodeError>>);

/// Run one coordinator and `config.workers` workers to termination, one
/// thread each.
///
/// Returns on the first process failure without waiting for the rest.
pub fn run_cluster(config: &ClusterConfig) -> Result<ClusterReport, SimulationError> {
    run_cluster_with(config, IterationWorkload::for_process)
}

/// Like [`run_cluster`], with the workload of each process built by
/// `workload_for`.
///
/// A panic on a process thread is reported as
/// [`SimulationError::Panicked`] for that process.
pub fn run_cluster_with<W, F>(
    config: &ClusterConfig,
    workload_for: F,
) -> Result<ClusterReport, SimulationError>
where
    W: Workload + Send + 'static,
    F: Fn(ProcessId) -> W,
{
    let process_count = config.process_count();
    Topology::new(ProcessId::COORDINATOR, process_count)?;

    let fabric = MemoryFabric::new(process_count);
    let monitor = Arc::new(CriticalSectionMonitor::new());
    let (done_tx, done_rx) = channel::unbounded::<Outcome>();
    let started = Instant::now();

    info!(
        workers = config.workers,
        use_lock = config.node.use_lock,
        mode = %config.node.mutex_mode,
        "starting cluster"
    );

    let mut handles = Vec::with_capacity(process_count);
    for id in 0..process_count as u8 {
        let process = ProcessId(id);
        let topology = Topology::new(process, process_count)?;
        let transport = fabric.transport(process);
        let workload = OccupancyProbe::new(workload_for(process), monitor.clone());
        let node_config = config.node.clone();
        let done_tx = done_tx.clone();

        let handle = thread::Builder::new()
            .name(format!("process-{id}"))
            .spawn(move || {
                let mut node = Process::new(topology, transport, workload, node_config);
                let result = panic::catch_unwind(AssertUnwindSafe(|| node.run()));
                // Report before `node` drops its channels so peers cannot
                // surface a disconnect ahead of the panic.
                let _ = done_tx.send((process, result));
            })
            .map_err(|e| SimulationError::Spawn {
                process,
                reason: e.to_string(),
            })?;
        handles.push((process, handle));
    }
    drop(done_tx);

    let mut reports: Vec<Option<ProcessReport>> = vec![None; process_count];
    for _ in 0..process_count {
        let Ok((process, outcome)) = done_rx.recv() else {
            // Every thread has exited, some without reporting.
            return Err(SimulationError::Panicked(unreported(handles, &reports)));
        };
        match outcome {
            Ok(Ok(report)) => {
                debug!(
                    process = process.0,
                    clock = report.final_clock.0,
                    "process terminated"
                );
                reports[process.as_usize()] = Some(report);
            }
            Ok(Err(source)) => return Err(SimulationError::Process { process, source }),
            Err(_) => {
                warn!(process = process.0, "process thread panicked");
                return Err(SimulationError::Panicked(process));
            }
        }
    }

    let processes: Vec<ProcessReport> = reports.into_iter().flatten().collect();
    let report = ClusterReport {
        workers: config.workers,
        use_lock: config.node.use_lock,
        mode: config.node.mutex_mode,
        processes,
        max_occupancy: monitor.max_occupancy(),
        overlaps: monitor.overlaps(),
        entry_order: monitor.entry_order(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        workers = report.workers,
        lock_entries = report.lock_entries(),
        overlaps = report.overlaps,
        elapsed_ms = report.elapsed_ms,
        "cluster finished"
    );
    Ok(report)
}

/// Pick the process whose thread died without reporting, preferring one
/// whose join shows a panic.
fn unreported(
    handles: Vec<(ProcessId, thread::JoinHandle<()>)>,
    reports: &[Option<ProcessReport>],
) -> ProcessId {
    let silent = handles
        .into_iter()
        .filter(|(process, _)| reports[process.as_usize()].is_none());
    let mut fallback = None;
    for (process, handle) in silent {
        if handle.join().is_err() {
            return process;
        }
        fallback.get_or_insert(process);
    }
    fallback.unwrap_or(ProcessId::COORDINATOR)
}
