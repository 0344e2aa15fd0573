//! Clock-stamping send glue and non-blocking receive.

use crate::{Action, ChannelConfig, Transport, TransportError};
use lamport_messages::{wire, Envelope, EnvelopeError};
use lamport_types::{ClockError, LamportClock, LogicalTimestamp, ProcessId, Topology};
use thiserror::Error;
use tracing::{trace, warn};

/// Errors surfaced by send and receive operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A received frame failed validation.
    #[error("malformed envelope from {peer}: {source}")]
    Envelope {
        /// Sender of the frame.
        peer: ProcessId,
        /// Validation failure.
        #[source]
        source: EnvelopeError,
    },

    /// The local clock cannot advance any further.
    #[error("clock error: {0}")]
    Clock(#[from] ClockError),
}

/// Message counters for one process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Envelopes written, one per destination.
    pub sent: u64,
    /// Envelopes received and decoded.
    pub received: u64,
}

/// A process's view of the channel fabric.
///
/// Owns the Lamport clock: the clock advances exactly once per outbound
/// envelope (multicast counts as one) and exactly once per inbound
/// envelope, and nowhere else.
pub struct Communicator<T> {
    topology: Topology,
    clock: LamportClock,
    transport: T,
    config: ChannelConfig,
    /// Index into the peer list where the next `poll_order` starts.
    poll_cursor: usize,
    stats: ChannelStats,
}

impl<T: Transport> Communicator<T> {
    /// Create a communicator with a fresh clock.
    pub fn new(topology: Topology, transport: T, config: ChannelConfig) -> Self {
        Self {
            topology,
            clock: LamportClock::new(),
            transport,
            config,
            poll_cursor: 0,
            stats: ChannelStats::default(),
        }
    }

    /// Replace the clock (tests and simulations that need a specific reading).
    pub fn with_clock(mut self, clock: LamportClock) -> Self {
        self.clock = clock;
        self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get the local process id.
    pub fn local(&self) -> ProcessId {
        self.topology.local()
    }

    /// Get the topology.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Current logical time.
    pub fn now(&self) -> LogicalTimestamp {
        self.clock.now()
    }

    /// Get the channel configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Get the message counters.
    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Sending
    // ═══════════════════════════════════════════════════════════════════════════

    /// Advance the clock, stamp `envelope` and send it to `to`.
    ///
    /// Returns the stamped timestamp.
    pub fn tick_send(
        &mut self,
        to: ProcessId,
        mut envelope: Envelope,
    ) -> Result<LogicalTimestamp, ChannelError> {
        if to == self.local() || !self.topology.contains(to) {
            return Err(TransportError::UnknownPeer(to).into());
        }

        self.clock.advance(LogicalTimestamp::ZERO)?;
        let ts = self.clock.now();
        envelope.stamp(ts);

        let frame = wire::encode(&envelope);
        self.write_frame(to, &frame, &envelope)?;
        Ok(ts)
    }

    /// Advance the clock once and send the same stamped envelope to every
    /// peer in ascending id order.
    ///
    /// Fails fast: the first transport failure aborts the multicast and
    /// copies already sent are not recalled.
    pub fn tick_multicast(
        &mut self,
        mut envelope: Envelope,
    ) -> Result<LogicalTimestamp, ChannelError> {
        self.clock.advance(LogicalTimestamp::ZERO)?;
        let ts = self.clock.now();
        envelope.stamp(ts);

        trace!(
            process = self.local().0,
            ts = ts.0,
            message_type = %envelope.message_type(),
            "multicast"
        );

        let frame = wire::encode(&envelope);
        let peers: Vec<ProcessId> = self.topology.peers().collect();
        for peer in peers {
            if let Err(e) = self.write_frame(peer, &frame, &envelope) {
                warn!(
                    process = self.local().0,
                    peer = peer.0,
                    error = %e,
                    "multicast aborted"
                );
                return Err(e);
            }
        }
        Ok(ts)
    }

    /// Execute control actions produced by a state machine, in order.
    pub fn execute(&mut self, actions: Vec<Action>) -> Result<(), ChannelError> {
        for action in actions {
            match action {
                Action::Send { to, message_type } => {
                    self.tick_send(to, Envelope::control(message_type))?;
                }
                Action::Multicast { message_type } => {
                    self.tick_multicast(Envelope::control(message_type))?;
                }
            }
        }
        Ok(())
    }

    fn write_frame(
        &mut self,
        to: ProcessId,
        frame: &[u8],
        envelope: &Envelope,
    ) -> Result<(), ChannelError> {
        let written = self.transport.send(to, frame)?;
        if written != frame.len() {
            return Err(TransportError::ShortWrite {
                peer: to,
                written,
                expected: frame.len(),
            }
            .into());
        }
        self.stats.sent += 1;
        trace!(
            process = self.local().0,
            peer = to.0,
            ts = envelope.timestamp().0,
            message_type = %envelope.message_type(),
            bytes = written,
            "send"
        );
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Receiving
    // ═══════════════════════════════════════════════════════════════════════════

    /// Pull one envelope from `from` without blocking.
    ///
    /// On success the clock advances past the envelope's timestamp before
    /// the envelope is returned. A timestamp the clock cannot advance past
    /// consumes the frame and fails with [`ChannelError::Clock`].
    pub fn receive(&mut self, from: ProcessId) -> Result<Option<Envelope>, ChannelError> {
        let Some(frame) = self.transport.try_receive(from)? else {
            return Ok(None);
        };

        let envelope =
            wire::decode(&frame).map_err(|source| ChannelError::Envelope { peer: from, source })?;

        let previous = self.clock.now();
        self.clock.advance(envelope.timestamp())?;
        self.stats.received += 1;

        trace!(
            process = self.local().0,
            peer = from.0,
            ts = envelope.timestamp().0,
            prev = previous.0,
            now = self.clock.now().0,
            message_type = %envelope.message_type(),
            "receive"
        );
        Ok(Some(envelope))
    }

    /// Peers in polling order, starting after the last peer served.
    pub fn poll_order(&self) -> Vec<ProcessId> {
        let peers: Vec<ProcessId> = self.topology.peers().collect();
        if peers.is_empty() {
            return peers;
        }
        let start = self.poll_cursor % peers.len();
        peers[start..].iter().chain(&peers[..start]).copied().collect()
    }

    /// Record that `peer` was served so the next round starts after it.
    pub fn mark_served(&mut self, peer: ProcessId) {
        if let Some(idx) = self.topology.peers().position(|p| p == peer) {
            self.poll_cursor = idx + 1;
        }
    }
}
