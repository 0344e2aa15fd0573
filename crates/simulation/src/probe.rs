//! Observation of overlapping critical sections across threads.

use lamport_messages::Envelope;
use lamport_node::Workload;
use lamport_types::ProcessId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::warn;

/// Shared record of who is performing work right now.
#[derive(Debug, Default)]
pub struct CriticalSectionMonitor {
    occupancy: AtomicUsize,
    max_occupancy: AtomicUsize,
    overlaps: AtomicU64,
    entries: Mutex<Vec<ProcessId>>,
}

impl CriticalSectionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `process` started a unit of work.
    pub fn enter(&self, process: ProcessId) {
        let occupancy = self.occupancy.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_occupancy.fetch_max(occupancy, Ordering::SeqCst);
        if occupancy > 1 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
            warn!(process = process.0, occupancy, "overlapping unit of work");
        }
        self.entries.lock().push(process);
    }

    /// Record that a unit of work finished.
    pub fn exit(&self) {
        self.occupancy.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_occupancy(&self) -> usize {
        self.max_occupancy.load(Ordering::SeqCst)
    }

    /// Number of entries that found another unit of work in progress.
    pub fn overlaps(&self) -> u64 {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Processes in the order they entered.
    pub fn entry_order(&self) -> Vec<ProcessId> {
        self.entries.lock().clone()
    }
}

/// Wraps a workload so every unit of work is reported to a monitor.
pub struct OccupancyProbe<W> {
    inner: W,
    monitor: Arc<CriticalSectionMonitor>,
}

impl<W> OccupancyProbe<W> {
    pub fn new(inner: W, monitor: Arc<CriticalSectionMonitor>) -> Self {
        Self { inner, monitor }
    }
}

impl<W: Workload> Workload for OccupancyProbe<W> {
    fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }

    fn perform(&mut self, local: ProcessId) {
        self.monitor.enter(local);
        self.inner.perform(local);
        // Widen the window so unprotected runs actually collide.
        thread::yield_now();
        self.monitor.exit();
    }

    fn on_domain_message(&mut self, envelope: &Envelope, from: ProcessId) {
        self.inner.on_domain_message(envelope, from);
    }
}
