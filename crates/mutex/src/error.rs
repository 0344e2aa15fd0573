use crate::LockState;
use lamport_core::ChannelError;
use lamport_types::ProcessId;
use thiserror::Error;

/// Errors from the mutual exclusion manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutexError {
    /// The operation is not allowed in the current lock state.
    #[error("operation not allowed while {state}")]
    InvalidState {
        /// State at the time of the call.
        state: LockState,
    },

    /// The coordinator never takes part in the lock protocol.
    #[error("{0} does not take part in mutual exclusion")]
    NotParticipant(ProcessId),

    /// Sending or receiving a protocol message failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}
