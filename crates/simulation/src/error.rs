use lamport_core::ChannelError;
use lamport_mutex::MutexError;
use lamport_node::NodeError;
use lamport_types::{ProcessId, TopologyError};
use thiserror::Error;

/// Errors from running a cluster or a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("invalid topology: {0}")]
    Topology(#[from] TopologyError),

    /// A process thread returned an error.
    #[error("{process} failed: {source}")]
    Process {
        process: ProcessId,
        #[source]
        source: NodeError,
    },

    /// A process thread could not be spawned.
    #[error("failed to spawn {process}: {reason}")]
    Spawn { process: ProcessId, reason: String },

    /// A process thread panicked.
    #[error("{0} panicked")]
    Panicked(ProcessId),

    /// More than one process held the critical section at once.
    #[error("mutual exclusion violated at step {step}: {holders:?} active")]
    SafetyViolation {
        step: u64,
        holders: Vec<ProcessId>,
    },

    /// The run did not terminate within the step budget.
    #[error("no termination after {max_steps} steps")]
    StepLimit { max_steps: u64 },

    #[error("channel failure: {0}")]
    Channel(#[from] ChannelError),

    #[error("lock failure: {0}")]
    Mutex(#[from] MutexError),
}
