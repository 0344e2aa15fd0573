//! Static full-mesh topology.

use crate::ProcessId;

/// Maximum number of processes in a mesh (ids 0..=15).
pub const MAX_PROCESSES: usize = 16;

/// Errors that can occur when building a topology.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// Process count outside `2..=MAX_PROCESSES`.
    #[error("process count {0} out of range (2..={max})", max = MAX_PROCESSES)]
    InvalidProcessCount(usize),

    /// Local id is not a member of the mesh.
    #[error("{local} is not a member of a mesh of {process_count} processes")]
    NotAMember {
        /// The offending local id.
        local: ProcessId,
        /// Total process count.
        process_count: usize,
    },
}

/// Membership as seen by one process.
///
/// Membership is static: N processes with ids `0..N`, fully meshed with
/// N×(N−1) unidirectional channels. Process 0 is the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    local: ProcessId,
    process_count: usize,
}

impl Topology {
    /// Create the topology for `local` in a mesh of `process_count` processes.
    pub fn new(local: ProcessId, process_count: usize) -> Result<Self, TopologyError> {
        if !(2..=MAX_PROCESSES).contains(&process_count) {
            return Err(TopologyError::InvalidProcessCount(process_count));
        }
        if local.as_usize() >= process_count {
            return Err(TopologyError::NotAMember {
                local,
                process_count,
            });
        }
        Ok(Self {
            local,
            process_count,
        })
    }

    /// Get the local process id.
    pub fn local(&self) -> ProcessId {
        self.local
    }

    /// Get the total number of processes, coordinator included.
    pub fn process_count(&self) -> usize {
        self.process_count
    }

    /// Check if the local process is the coordinator.
    pub fn is_coordinator(&self) -> bool {
        self.local.is_coordinator()
    }

    /// Check if `id` belongs to the mesh.
    pub fn contains(&self, id: ProcessId) -> bool {
        id.as_usize() < self.process_count
    }

    /// All process ids, ascending.
    pub fn all(&self) -> impl Iterator<Item = ProcessId> {
        (0..self.process_count as u8).map(ProcessId)
    }

    /// Every process except the local one, ascending. Multicast order.
    pub fn peers(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.all().filter(move |id| *id != self.local)
    }

    /// Every worker id (coordinator excluded), ascending.
    pub fn workers(&self) -> impl Iterator<Item = ProcessId> {
        (1..self.process_count as u8).map(ProcessId)
    }

    /// Peers a barrier waits on: every worker except the local process.
    pub fn tracked_peers(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.workers().filter(move |id| *id != self.local)
    }

    /// Number of workers in the mesh.
    pub fn worker_count(&self) -> usize {
        self.process_count - 1
    }
}
