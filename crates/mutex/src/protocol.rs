//! Blocking acquire and release over a communicator.
//!
//! The owner of a [`MutexState`] is usually a larger per-process state that
//! also handles lifecycle and domain traffic. It is passed in as the dispatch
//! hook so every envelope pulled while waiting for replies reaches it.

use crate::{LockState, MutexError, MutexMode, MutexState};
use lamport_core::barrier::wait_for;
use lamport_core::{receive_any_and_dispatch, Communicator, Dispatch, Transport};
use lamport_messages::{Envelope, MessageType};
use lamport_types::LogicalTimestamp;
use std::thread;
use tracing::debug;

/// Access to the lock state machine embedded in a larger process state.
pub trait LockOwner {
    fn mutex(&self) -> &MutexState;
    fn mutex_mut(&mut self) -> &mut MutexState;
}

impl LockOwner for MutexState {
    fn mutex(&self) -> &MutexState {
        self
    }

    fn mutex_mut(&mut self) -> &mut MutexState {
        self
    }
}

/// Acquire the critical section, blocking until granted.
///
/// Returns immediately if already Active. A call while Waiting is a no-op.
pub fn request_cs<T, D>(comm: &mut Communicator<T>, owner: &mut D) -> Result<(), MutexError>
where
    T: Transport,
    D: Dispatch<T> + LockOwner + ?Sized,
{
    match owner.mutex().state() {
        LockState::Active => Ok(()),
        LockState::Waiting => {
            debug!(process = comm.local().0, "request already in progress");
            Ok(())
        }
        LockState::Inactive => {
            send_request(comm, owner)?;
            await_grant(comm, owner)
        }
    }
}

/// Multicast `CsRequest` and move to Waiting without blocking.
///
/// Returns the request timestamp, or `None` if not Inactive.
pub fn send_request<T, D>(
    comm: &mut Communicator<T>,
    owner: &mut D,
) -> Result<Option<LogicalTimestamp>, MutexError>
where
    T: Transport,
    D: LockOwner + ?Sized,
{
    let mutex = owner.mutex();
    if !mutex.is_participant() {
        return Err(MutexError::NotParticipant(mutex.local()));
    }
    if mutex.state() != LockState::Inactive {
        return Ok(None);
    }

    let stamp = comm.tick_multicast(Envelope::control(MessageType::CsRequest))?;
    owner.mutex_mut().mark_waiting(stamp)?;
    Ok(Some(stamp))
}

/// Block until a Waiting request is granted.
///
/// Does nothing unless Waiting.
pub fn await_grant<T, D>(comm: &mut Communicator<T>, owner: &mut D) -> Result<(), MutexError>
where
    T: Transport,
    D: Dispatch<T> + LockOwner + ?Sized,
{
    let Some(condition) = owner.mutex().reply_condition() else {
        return Ok(());
    };

    let replies = owner.mutex().reply_set();
    wait_for(comm, replies, &condition, owner)?;

    // Queue mode: every peer has now sent something later than our request,
    // so FIFO delivery guarantees any earlier request is already queued.
    if owner.mutex().mode() == MutexMode::LamportQueue {
        while !owner.mutex().heads_queue() {
            if !receive_any_and_dispatch(comm, owner)? {
                thread::sleep(comm.config().poll_interval);
            }
        }
    }

    owner.mutex_mut().grant()
}

/// Leave the critical section and send whatever the state machine owes.
///
/// A no-op while Inactive; rejected while Waiting.
pub fn release_cs<T, D>(comm: &mut Communicator<T>, owner: &mut D) -> Result<(), MutexError>
where
    T: Transport,
    D: LockOwner + ?Sized,
{
    let actions = owner.mutex_mut().release()?;
    comm.execute(actions)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamport_core::loopback::{LoopbackMesh, LoopbackTransport};
    use lamport_core::ChannelConfig;
    use lamport_types::{LamportClock, LockRequest, ProcessId, Topology};
    use std::time::Duration;
    use tracing_test::traced_test;

    struct Node {
        comm: Communicator<LoopbackTransport>,
        mutex: MutexState,
    }

    impl Node {
        fn drain(&mut self) {
            while receive_any_and_dispatch(&mut self.comm, &mut self.mutex).unwrap() {}
        }
    }

    /// Coordinator plus workers, every clock reading `clock`.
    fn cluster(n: usize, mode: MutexMode, clock: u64) -> (LoopbackMesh, Vec<Node>) {
        let mesh = LoopbackMesh::new(n);
        let config = ChannelConfig::with_poll_interval(Duration::from_micros(10));
        let nodes = (0..n as u8)
            .map(|id| {
                let topology = Topology::new(ProcessId(id), n).unwrap();
                let transport = mesh.transport(ProcessId(id));
                let comm = Communicator::new(topology, transport, config.clone())
                    .with_clock(LamportClock::starting_at(LogicalTimestamp(clock)));
                Node {
                    comm,
                    mutex: MutexState::new(&topology, mode),
                }
            })
            .collect();
        (mesh, nodes)
    }

    #[traced_test]
    #[test]
    fn test_simultaneous_requests_lower_id_wins() {
        let (_mesh, mut nodes) = cluster(3, MutexMode::RicartAgrawala, 2);

        let n1 = &mut nodes[1];
        let s1 = send_request(&mut n1.comm, &mut n1.mutex).unwrap();
        let n2 = &mut nodes[2];
        let s2 = send_request(&mut n2.comm, &mut n2.mutex).unwrap();
        assert_eq!(s1, Some(LogicalTimestamp(3)));
        assert_eq!(s2, Some(LogicalTimestamp(3)));

        // Process 2 sees [3, 1] beat its own [3, 2] and replies at once.
        nodes[2].drain();
        assert_eq!(nodes[2].mutex.state(), LockState::Waiting);
        assert!(nodes[2].mutex.deferred().is_empty());

        let n1 = &mut nodes[1];
        await_grant(&mut n1.comm, &mut n1.mutex).unwrap();
        assert_eq!(nodes[1].mutex.state(), LockState::Active);
        assert!(nodes[1].mutex.deferred().contains(ProcessId(2)));
        assert_eq!(nodes[2].mutex.state(), LockState::Waiting);

        let n1 = &mut nodes[1];
        release_cs(&mut n1.comm, &mut n1.mutex).unwrap();
        let n2 = &mut nodes[2];
        await_grant(&mut n2.comm, &mut n2.mutex).unwrap();
        assert_eq!(nodes[2].mutex.state(), LockState::Active);
        assert!(logs_contain("entered critical section"));
    }

    #[test]
    fn test_request_uses_multicast_stamp() {
        let (_mesh, mut nodes) = cluster(3, MutexMode::RicartAgrawala, 7);
        let n1 = &mut nodes[1];
        send_request(&mut n1.comm, &mut n1.mutex).unwrap();

        assert_eq!(
            nodes[1].mutex.own_request(),
            Some(LockRequest::new(ProcessId(1), LogicalTimestamp(8)))
        );
        let envelope = nodes[2].comm.receive(ProcessId(1)).unwrap().unwrap();
        assert_eq!(envelope.timestamp(), LogicalTimestamp(8));
    }

    #[test]
    fn test_release_while_inactive_sends_nothing() {
        let (mesh, mut nodes) = cluster(3, MutexMode::RicartAgrawala, 0);
        let n1 = &mut nodes[1];
        release_cs(&mut n1.comm, &mut n1.mutex).unwrap();

        assert_eq!(nodes[1].mutex.state(), LockState::Inactive);
        assert_eq!(mesh.in_flight(), 0);
        assert_eq!(nodes[1].comm.now(), LogicalTimestamp::ZERO);
    }

    #[test]
    fn test_release_while_waiting_is_rejected() {
        let (_mesh, mut nodes) = cluster(3, MutexMode::RicartAgrawala, 0);
        let n1 = &mut nodes[1];
        send_request(&mut n1.comm, &mut n1.mutex).unwrap();
        assert_eq!(
            release_cs(&mut n1.comm, &mut n1.mutex),
            Err(MutexError::InvalidState {
                state: LockState::Waiting
            })
        );
    }

    #[test]
    fn test_request_while_active_is_idempotent() {
        let (mesh, mut nodes) = cluster(2, MutexMode::RicartAgrawala, 0);
        let n1 = &mut nodes[1];
        request_cs(&mut n1.comm, &mut n1.mutex).unwrap();
        assert_eq!(n1.mutex.state(), LockState::Active);
        let in_flight = mesh.in_flight();

        request_cs(&mut n1.comm, &mut n1.mutex).unwrap();
        assert_eq!(n1.mutex.state(), LockState::Active);
        assert_eq!(mesh.in_flight(), in_flight);
        assert_eq!(n1.mutex.entries(), 1);
    }

    #[test]
    fn test_request_while_waiting_is_noop() {
        let (mesh, mut nodes) = cluster(3, MutexMode::RicartAgrawala, 0);
        let n1 = &mut nodes[1];
        send_request(&mut n1.comm, &mut n1.mutex).unwrap();
        let in_flight = mesh.in_flight();

        request_cs(&mut n1.comm, &mut n1.mutex).unwrap();
        assert_eq!(n1.mutex.state(), LockState::Waiting);
        assert_eq!(mesh.in_flight(), in_flight);
    }

    #[test]
    fn test_deferred_reply_sent_exactly_once() {
        let (mesh, mut nodes) = cluster(4, MutexMode::RicartAgrawala, 0);
        let n1 = &mut nodes[1];
        send_request(&mut n1.comm, &mut n1.mutex).unwrap();
        for id in [2usize, 3] {
            nodes[id].drain();
        }
        let n1 = &mut nodes[1];
        await_grant(&mut n1.comm, &mut n1.mutex).unwrap();

        let n2 = &mut nodes[2];
        send_request(&mut n2.comm, &mut n2.mutex).unwrap();
        nodes[1].drain();
        assert!(nodes[1].mutex.deferred().contains(ProcessId(2)));
        assert_eq!(mesh.pending(ProcessId(1), ProcessId(2)), 0);

        let n1 = &mut nodes[1];
        release_cs(&mut n1.comm, &mut n1.mutex).unwrap();
        release_cs(&mut n1.comm, &mut n1.mutex).unwrap();
        assert_eq!(mesh.pending(ProcessId(1), ProcessId(2)), 1);
    }

    #[test]
    fn test_queue_mode_orders_entries() {
        let (_mesh, mut nodes) = cluster(3, MutexMode::LamportQueue, 2);
        for id in [1usize, 2] {
            let node = &mut nodes[id];
            send_request(&mut node.comm, &mut node.mutex).unwrap();
        }
        nodes[2].drain();

        let n1 = &mut nodes[1];
        await_grant(&mut n1.comm, &mut n1.mutex).unwrap();
        assert_eq!(nodes[1].mutex.state(), LockState::Active);

        nodes[2].drain();
        let replies = {
            let mut set = nodes[2].mutex.reply_set();
            set.mark(ProcessId(1));
            set
        };
        assert!(!nodes[2].mutex.can_enter(&replies));

        let n1 = &mut nodes[1];
        release_cs(&mut n1.comm, &mut n1.mutex).unwrap();
        let n2 = &mut nodes[2];
        await_grant(&mut n2.comm, &mut n2.mutex).unwrap();
        assert_eq!(nodes[2].mutex.state(), LockState::Active);
        assert!(nodes[2].mutex.heads_queue());
    }

    #[test]
    fn test_coordinator_cannot_request() {
        let (_mesh, mut nodes) = cluster(3, MutexMode::RicartAgrawala, 0);
        let n0 = &mut nodes[0];
        assert_eq!(
            request_cs(&mut n0.comm, &mut n0.mutex),
            Err(MutexError::NotParticipant(ProcessId(0)))
        );
    }
}
