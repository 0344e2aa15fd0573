//! Outbound actions produced by protocol state machines.

use lamport_messages::MessageType;
use lamport_types::ProcessId;

/// A control message a state machine wants sent.
///
/// State machines never touch the transport. They return actions and the
/// [`Communicator`](crate::Communicator) executes them, stamping each one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Send a payload-less control envelope to one peer.
    Send {
        /// Destination.
        to: ProcessId,
        /// Control message type.
        message_type: MessageType,
    },

    /// Send a payload-less control envelope to every peer.
    Multicast {
        /// Control message type.
        message_type: MessageType,
    },
}

impl Action {
    /// Get the message type carried by this action.
    pub fn message_type(&self) -> MessageType {
        match self {
            Action::Send { message_type, .. } | Action::Multicast { message_type } => {
                *message_type
            }
        }
    }
}
