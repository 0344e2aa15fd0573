//! Work performed by a worker between lifecycle barriers.

use lamport_messages::Envelope;
use lamport_types::ProcessId;
use tracing::info;

/// Unit-of-work source for a worker.
///
/// The driver calls [`perform`](Workload::perform) once per loop iteration,
/// inside the critical section when locking is enabled, until
/// [`is_complete`](Workload::is_complete) holds.
pub trait Workload {
    /// Check whether the local completion condition holds.
    fn is_complete(&self) -> bool;

    /// Perform one unit of work.
    fn perform(&mut self, local: ProcessId);

    /// Handle a domain envelope routed through the dispatch hook.
    fn on_domain_message(&mut self, _envelope: &Envelope, _from: ProcessId) {}
}

impl<W: Workload + ?Sized> Workload for Box<W> {
    fn is_complete(&self) -> bool {
        (**self).is_complete()
    }

    fn perform(&mut self, local: ProcessId) {
        (**self).perform(local)
    }

    fn on_domain_message(&mut self, envelope: &Envelope, from: ProcessId) {
        (**self).on_domain_message(envelope, from)
    }
}

/// Fixed number of logged iterations.
///
/// Worker `i` runs `5 * i` iterations by default, so workers finish at
/// different times and the lock sees contention of varying length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationWorkload {
    total: u64,
    done: u64,
}

impl IterationWorkload {
    /// Iterations per unit of process id.
    pub const ITERATIONS_PER_ID: u64 = 5;

    /// Default workload for `process`.
    pub fn for_process(process: ProcessId) -> Self {
        Self::with_total(Self::ITERATIONS_PER_ID * process.0 as u64)
    }

    /// Workload with an explicit iteration count.
    pub fn with_total(total: u64) -> Self {
        Self { total, done: 0 }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn completed(&self) -> u64 {
        self.done
    }
}

impl Workload for IterationWorkload {
    fn is_complete(&self) -> bool {
        self.done >= self.total
    }

    fn perform(&mut self, local: ProcessId) {
        if self.is_complete() {
            return;
        }
        self.done += 1;
        info!(
            process = local.0,
            iteration = self.done,
            total = self.total,
            "process {} is doing {} iteration out of {}",
            local.0,
            self.done,
            self.total
        );
    }
}
