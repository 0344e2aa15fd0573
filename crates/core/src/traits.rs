//! Core traits: the transport seam and the dispatch hook.

use crate::{ChannelError, Communicator};
use bytes::Bytes;
use lamport_messages::Envelope;
use lamport_types::ProcessId;
use thiserror::Error;

/// Errors reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The channel to or from the peer is gone.
    #[error("channel with {0} is disconnected")]
    Disconnected(ProcessId),

    /// The underlying write did not take the whole frame.
    #[error("short write to {peer}: {written} of {expected} bytes")]
    ShortWrite {
        /// Destination.
        peer: ProcessId,
        /// Bytes accepted by the channel.
        written: usize,
        /// Frame length.
        expected: usize,
    },

    /// No channel exists for this peer.
    #[error("no channel for {0}")]
    UnknownPeer(ProcessId),
}

/// Point-to-point byte channels to every peer.
///
/// Provisioning (spawning processes, wiring N×(N−1) channels) happens
/// outside this crate; a `Transport` is handed over already open. Channels
/// are reliable and FIFO per direction.
pub trait Transport {
    /// Write one frame to `to`.
    ///
    /// Returns the number of bytes the channel accepted.
    fn send(&mut self, to: ProcessId, frame: &[u8]) -> Result<usize, TransportError>;

    /// Pull one frame from `from` without blocking.
    ///
    /// Returns `Ok(None)` when nothing is currently available.
    fn try_receive(&mut self, from: ProcessId) -> Result<Option<Bytes>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, to: ProcessId, frame: &[u8]) -> Result<usize, TransportError> {
        (**self).send(to, frame)
    }

    fn try_receive(&mut self, from: ProcessId) -> Result<Option<Bytes>, TransportError> {
        (**self).try_receive(from)
    }
}

/// Handler every received envelope is routed through.
///
/// Barrier loops call this for every envelope they pull, whether or not it
/// satisfies the condition being waited on, so control messages interleaved
/// with unrelated traffic are never dropped.
pub trait Dispatch<T: Transport> {
    /// Handle one envelope received from `from`.
    ///
    /// The communicator is passed back so the handler can reply.
    fn dispatch(
        &mut self,
        comm: &mut Communicator<T>,
        envelope: &Envelope,
        from: ProcessId,
    ) -> Result<(), ChannelError>;
}

/// Discards everything. Useful when a barrier has nothing else to process.
impl<T: Transport> Dispatch<T> for () {
    fn dispatch(
        &mut self,
        _comm: &mut Communicator<T>,
        _envelope: &Envelope,
        _from: ProcessId,
    ) -> Result<(), ChannelError> {
        Ok(())
    }
}
