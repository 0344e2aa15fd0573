//! Conditional-wait primitive.
//!
//! A barrier polls every unsatisfied peer until a [`Condition`] has held for
//! a message from each of them. Every envelope pulled along the way is
//! routed through a [`Dispatch`] hook first, whether or not it satisfies the
//! condition, so protocol traffic is never dropped while waiting for
//! something unrelated.

use crate::{ChannelError, Communicator, Dispatch, Transport};
use lamport_messages::{Envelope, MessageType};
use lamport_types::{LogicalTimestamp, ProcessId, Topology};
use std::collections::BTreeMap;
use std::thread;
use tracing::{debug, trace};

/// A predicate over received envelopes.
pub trait Condition {
    /// Check whether `envelope` satisfies the condition for its sender.
    fn is_met(&self, envelope: &Envelope) -> bool;
}

impl<F> Condition for F
where
    F: Fn(&Envelope) -> bool,
{
    fn is_met(&self, envelope: &Envelope) -> bool {
        self(envelope)
    }
}

/// The two canonical barrier predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// Message type equals the given type.
    TypeIs(MessageType),
    /// Message timestamp strictly greater than the given value.
    TimestampAfter(LogicalTimestamp),
}

impl Condition for WaitCondition {
    fn is_met(&self, envelope: &Envelope) -> bool {
        match *self {
            WaitCondition::TypeIs(message_type) => envelope.message_type() == message_type,
            WaitCondition::TimestampAfter(ts) => envelope.timestamp() > ts,
        }
    }
}

/// Per-peer "condition observed" flags for one barrier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SatisfactionSet {
    flags: BTreeMap<ProcessId, bool>,
}

impl SatisfactionSet {
    /// Track the given peers, all initially unsatisfied.
    pub fn new(peers: impl IntoIterator<Item = ProcessId>) -> Self {
        Self {
            flags: peers.into_iter().map(|p| (p, false)).collect(),
        }
    }

    /// Track every worker except the local process.
    pub fn for_topology(topology: &Topology) -> Self {
        Self::new(topology.tracked_peers())
    }

    pub fn is_tracked(&self, peer: ProcessId) -> bool {
        self.flags.contains_key(&peer)
    }

    pub fn is_satisfied(&self, peer: ProcessId) -> bool {
        self.flags.get(&peer).copied().unwrap_or(false)
    }

    /// Mark `peer` satisfied. Returns true if the flag changed.
    ///
    /// Untracked peers are ignored.
    pub fn mark(&mut self, peer: ProcessId) -> bool {
        match self.flags.get_mut(&peer) {
            Some(flag) if !*flag => {
                *flag = true;
                true
            }
            _ => false,
        }
    }

    /// Unsatisfied peers, ascending.
    pub fn pending(&self) -> Vec<ProcessId> {
        self.flags
            .iter()
            .filter(|(_, satisfied)| !**satisfied)
            .map(|(peer, _)| *peer)
            .collect()
    }

    /// Check if every tracked peer is satisfied.
    pub fn is_complete(&self) -> bool {
        self.flags.values().all(|satisfied| *satisfied)
    }

    /// Number of tracked peers.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Pull at most one envelope from `peer`, dispatch it, and report whether
/// it satisfied `condition`.
///
/// Returns `None` when the channel was empty.
pub fn poll_peer<T, C, D>(
    comm: &mut Communicator<T>,
    peer: ProcessId,
    condition: &C,
    dispatch: &mut D,
) -> Result<Option<bool>, ChannelError>
where
    T: Transport,
    C: Condition + ?Sized,
    D: Dispatch<T> + ?Sized,
{
    let Some(envelope) = comm.receive(peer)? else {
        return Ok(None);
    };
    dispatch.dispatch(comm, &envelope, peer)?;
    Ok(Some(condition.is_met(&envelope)))
}

/// Block until `condition` has held for a message from every tracked peer
/// of the local topology.
pub fn wait_until<T, C, D>(
    comm: &mut Communicator<T>,
    condition: &C,
    dispatch: &mut D,
) -> Result<(), ChannelError>
where
    T: Transport,
    C: Condition + ?Sized,
    D: Dispatch<T> + ?Sized,
{
    let satisfaction = SatisfactionSet::for_topology(comm.topology());
    wait_for(comm, satisfaction, condition, dispatch)
}

/// Block until `condition` has held for a message from every peer in
/// `satisfaction`.
///
/// Polls unsatisfied peers round-robin and sleeps for the configured poll
/// interval after a round that received nothing. There is no timeout: a
/// peer that never sends stalls the caller.
pub fn wait_for<T, C, D>(
    comm: &mut Communicator<T>,
    mut satisfaction: SatisfactionSet,
    condition: &C,
    dispatch: &mut D,
) -> Result<(), ChannelError>
where
    T: Transport,
    C: Condition + ?Sized,
    D: Dispatch<T> + ?Sized,
{
    let mut rounds = 0u64;
    while !satisfaction.is_complete() {
        let mut progress = false;
        for peer in satisfaction.pending() {
            if let Some(met) = poll_peer(comm, peer, condition, dispatch)? {
                progress = true;
                if met && satisfaction.mark(peer) {
                    trace!(
                        process = comm.local().0,
                        peer = peer.0,
                        remaining = satisfaction.pending().len(),
                        "barrier peer satisfied"
                    );
                }
            }
        }
        rounds += 1;
        if !progress {
            thread::sleep(comm.config().poll_interval);
        }
    }

    debug!(
        process = comm.local().0,
        peers = satisfaction.len(),
        rounds,
        now = comm.now().0,
        "barrier complete"
    );
    Ok(())
}

/// Poll every peer once, starting after the last peer served, and dispatch
/// the first envelope found.
///
/// Returns whether an envelope was dispatched. Never sleeps.
pub fn receive_any_and_dispatch<T, D>(
    comm: &mut Communicator<T>,
    dispatch: &mut D,
) -> Result<bool, ChannelError>
where
    T: Transport,
    D: Dispatch<T> + ?Sized,
{
    for peer in comm.poll_order() {
        if let Some(envelope) = comm.receive(peer)? {
            comm.mark_served(peer);
            dispatch.dispatch(comm, &envelope, peer)?;
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{LoopbackMesh, LoopbackTransport};
    use crate::ChannelConfig;
    use std::time::Duration;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(ProcessId, MessageType)>,
    }

    impl Dispatch<LoopbackTransport> for Recorder {
        fn dispatch(
            &mut self,
            _comm: &mut Communicator<LoopbackTransport>,
            envelope: &Envelope,
            from: ProcessId,
        ) -> Result<(), ChannelError> {
            self.seen.push((from, envelope.message_type()));
            Ok(())
        }
    }

    fn cluster(n: usize) -> (LoopbackMesh, Vec<Communicator<LoopbackTransport>>) {
        let mesh = LoopbackMesh::new(n);
        let config = ChannelConfig::with_poll_interval(Duration::from_micros(10));
        let comms = (0..n as u8)
            .map(|id| {
                let topology = Topology::new(ProcessId(id), n).unwrap();
                Communicator::new(topology, mesh.transport(ProcessId(id)), config.clone())
            })
            .collect();
        (mesh, comms)
    }

    fn started_barrier(order: [usize; 2]) -> (Vec<(ProcessId, MessageType)>, LogicalTimestamp) {
        let (mesh, mut comms) = cluster(3);
        for worker in order {
            comms[worker]
                .tick_multicast(Envelope::control(MessageType::Started))
                .unwrap();
        }

        let mut recorder = Recorder::default();
        wait_until(
            &mut comms[0],
            &WaitCondition::TypeIs(MessageType::Started),
            &mut recorder,
        )
        .unwrap();

        assert_eq!(mesh.pending_for(ProcessId(0)), 0);
        (recorder.seen, comms[0].now())
    }

    #[traced_test]
    #[test]
    fn test_started_barrier_independent_of_arrival_order() {
        let (seen_a, now_a) = started_barrier([1, 2]);
        let (seen_b, now_b) = started_barrier([2, 1]);

        let expected = vec![
            (ProcessId(1), MessageType::Started),
            (ProcessId(2), MessageType::Started),
        ];
        assert_eq!(seen_a, expected);
        assert_eq!(seen_b, expected);
        assert_eq!(now_a, now_b);
        assert!(logs_contain("barrier complete"));
    }

    #[test]
    fn test_unmatched_messages_are_dispatched_not_counted() {
        let (_mesh, mut comms) = cluster(3);
        comms[1]
            .tick_send(ProcessId(0), Envelope::control(MessageType::CsRequest))
            .unwrap();
        comms[1]
            .tick_send(ProcessId(0), Envelope::control(MessageType::Done))
            .unwrap();
        comms[2]
            .tick_send(ProcessId(0), Envelope::control(MessageType::Done))
            .unwrap();

        let mut recorder = Recorder::default();
        wait_until(
            &mut comms[0],
            &WaitCondition::TypeIs(MessageType::Done),
            &mut recorder,
        )
        .unwrap();

        assert_eq!(
            recorder.seen,
            vec![
                (ProcessId(1), MessageType::CsRequest),
                (ProcessId(2), MessageType::Done),
                (ProcessId(1), MessageType::Done),
            ]
        );
    }

    #[test]
    fn test_satisfied_peers_are_not_polled_again() {
        let (mesh, mut comms) = cluster(3);
        comms[1]
            .tick_send(ProcessId(0), Envelope::control(MessageType::Started))
            .unwrap();
        comms[1]
            .tick_send(ProcessId(0), Envelope::control(MessageType::Done))
            .unwrap();
        comms[2]
            .tick_send(ProcessId(0), Envelope::control(MessageType::Started))
            .unwrap();

        wait_until(
            &mut comms[0],
            &WaitCondition::TypeIs(MessageType::Started),
            &mut (),
        )
        .unwrap();

        assert_eq!(mesh.pending(ProcessId(1), ProcessId(0)), 1);
    }

    #[test]
    fn test_timestamp_condition() {
        let (_mesh, mut comms) = cluster(3);
        let threshold = LogicalTimestamp(1);
        // Worker 2's first message is stamped 1 and does not count.
        comms[2]
            .tick_send(ProcessId(1), Envelope::control(MessageType::Started))
            .unwrap();
        comms[2]
            .tick_send(ProcessId(1), Envelope::control(MessageType::CsReply))
            .unwrap();

        let mut recorder = Recorder::default();
        wait_until(
            &mut comms[1],
            &WaitCondition::TimestampAfter(threshold),
            &mut recorder,
        )
        .unwrap();

        assert_eq!(recorder.seen.len(), 2);
        assert_eq!(comms[1].now(), LogicalTimestamp(3));
    }

    #[test]
    fn test_closure_condition() {
        let (_mesh, mut comms) = cluster(2);
        comms[0]
            .tick_send(ProcessId(1), Envelope::build(MessageType::Domain(3), &b"x"[..]).unwrap())
            .unwrap();

        // Coordinator messages are only awaited through an explicit set.
        let satisfaction = SatisfactionSet::new([ProcessId(0)]);
        let is_domain = |envelope: &Envelope| envelope.message_type().is_domain();
        wait_for(&mut comms[1], satisfaction, &is_domain, &mut ()).unwrap();
    }

    #[test]
    fn test_empty_barrier_returns_immediately() {
        let (_mesh, mut comms) = cluster(2);
        // A single worker tracks no peers.
        assert!(SatisfactionSet::for_topology(comms[1].topology()).is_empty());
        wait_until(
            &mut comms[1],
            &WaitCondition::TypeIs(MessageType::Started),
            &mut (),
        )
        .unwrap();
        assert_eq!(comms[1].now(), LogicalTimestamp::ZERO);
    }

    #[test]
    fn test_receive_any_rotates_between_peers() {
        let (_mesh, mut comms) = cluster(3);
        for _ in 0..2 {
            comms[1]
                .tick_send(ProcessId(0), Envelope::control(MessageType::Started))
                .unwrap();
            comms[2]
                .tick_send(ProcessId(0), Envelope::control(MessageType::Started))
                .unwrap();
        }

        let mut recorder = Recorder::default();
        while receive_any_and_dispatch(&mut comms[0], &mut recorder).unwrap() {}

        let senders: Vec<u8> = recorder.seen.iter().map(|(p, _)| p.0).collect();
        assert_eq!(senders, vec![1, 2, 1, 2]);
        assert!(!receive_any_and_dispatch(&mut comms[0], &mut recorder).unwrap());
    }

    #[test]
    fn test_satisfaction_set_marks_once() {
        let mut set = SatisfactionSet::new([ProcessId(1), ProcessId(2)]);
        assert!(set.mark(ProcessId(2)));
        assert!(!set.mark(ProcessId(2)));
        assert!(!set.mark(ProcessId(7)));
        assert!(!set.is_tracked(ProcessId(7)));
        assert_eq!(set.pending(), vec![ProcessId(1)]);
        assert!(set.mark(ProcessId(1)));
        assert!(set.is_complete());
    }
}
