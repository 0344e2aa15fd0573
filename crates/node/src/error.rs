use lamport_core::ChannelError;
use lamport_mutex::MutexError;
use lamport_types::TopologyError;
use thiserror::Error;

/// Errors that terminate a process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("invalid topology: {0}")]
    Topology(#[from] TopologyError),

    #[error("channel failure: {0}")]
    Channel(#[from] ChannelError),

    #[error("lock failure: {0}")]
    Mutex(#[from] MutexError),
}
