//! Single-threaded in-memory channel mesh.
//!
//! Every ordered pair of processes gets its own FIFO queue. Transports share
//! the mesh through `Rc<RefCell<_>>`, so a whole cluster can be driven from
//! one thread in a deterministic order.

use crate::{Transport, TransportError};
use bytes::Bytes;
use lamport_types::ProcessId;
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

#[derive(Debug)]
struct MeshState {
    process_count: usize,
    /// Queue for (from, to) lives at `from * process_count + to`.
    queues: Vec<VecDeque<Bytes>>,
    broken: HashSet<(ProcessId, ProcessId)>,
}

impl MeshState {
    fn index(&self, from: ProcessId, to: ProcessId) -> Option<usize> {
        let (f, t) = (from.as_usize(), to.as_usize());
        if f >= self.process_count || t >= self.process_count || f == t {
            return None;
        }
        Some(f * self.process_count + t)
    }
}

/// A full mesh of in-memory FIFO channels.
#[derive(Debug, Clone)]
pub struct LoopbackMesh {
    state: Rc<RefCell<MeshState>>,
}

impl LoopbackMesh {
    /// Create a mesh for `process_count` processes.
    pub fn new(process_count: usize) -> Self {
        let queues = (0..process_count * process_count)
            .map(|_| VecDeque::new())
            .collect();
        Self {
            state: Rc::new(RefCell::new(MeshState {
                process_count,
                queues,
                broken: HashSet::new(),
            })),
        }
    }

    /// Get the transport endpoint for process `id`.
    pub fn transport(&self, id: ProcessId) -> LoopbackTransport {
        LoopbackTransport {
            local: id,
            state: Rc::clone(&self.state),
        }
    }

    /// Number of frames queued on the channel `from` → `to`.
    pub fn pending(&self, from: ProcessId, to: ProcessId) -> usize {
        let state = self.state.borrow();
        state
            .index(from, to)
            .map(|idx| state.queues[idx].len())
            .unwrap_or(0)
    }

    /// Number of frames queued toward `to` from any sender.
    pub fn pending_for(&self, to: ProcessId) -> usize {
        let count = self.state.borrow().process_count;
        (0..count as u8)
            .map(|from| self.pending(ProcessId(from), to))
            .sum()
    }

    /// Total frames in flight.
    pub fn in_flight(&self) -> usize {
        self.state.borrow().queues.iter().map(VecDeque::len).sum()
    }

    /// Make the channel `from` → `to` fail on both ends.
    pub fn break_channel(&self, from: ProcessId, to: ProcessId) {
        self.state.borrow_mut().broken.insert((from, to));
    }

    /// Push a raw frame onto the channel `from` → `to`.
    pub fn inject_frame(&self, from: ProcessId, to: ProcessId, frame: impl Into<Bytes>) {
        let mut state = self.state.borrow_mut();
        if let Some(idx) = state.index(from, to) {
            state.queues[idx].push_back(frame.into());
        }
    }
}

/// One process's endpoint on a [`LoopbackMesh`].
#[derive(Debug)]
pub struct LoopbackTransport {
    local: ProcessId,
    state: Rc<RefCell<MeshState>>,
}

impl Transport for LoopbackTransport {
    fn send(&mut self, to: ProcessId, frame: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.borrow_mut();
        let idx = state
            .index(self.local, to)
            .ok_or(TransportError::UnknownPeer(to))?;
        if state.broken.contains(&(self.local, to)) {
            return Err(TransportError::Disconnected(to));
        }
        state.queues[idx].push_back(Bytes::copy_from_slice(frame));
        Ok(frame.len())
    }

    fn try_receive(&mut self, from: ProcessId) -> Result<Option<Bytes>, TransportError> {
        let mut state = self.state.borrow_mut();
        let idx = state
            .index(from, self.local)
            .ok_or(TransportError::UnknownPeer(from))?;
        if state.broken.contains(&(from, self.local)) {
            return Err(TransportError::Disconnected(from));
        }
        Ok(state.queues[idx].pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_are_fifo_per_direction() {
        let mesh = LoopbackMesh::new(3);
        let mut p1 = mesh.transport(ProcessId(1));
        let mut p2 = mesh.transport(ProcessId(2));

        p1.send(ProcessId(2), b"a").unwrap();
        p1.send(ProcessId(2), b"b").unwrap();
        p2.send(ProcessId(1), b"c").unwrap();

        assert_eq!(mesh.pending(ProcessId(1), ProcessId(2)), 2);
        assert_eq!(mesh.in_flight(), 3);
        assert_eq!(p2.try_receive(ProcessId(1)).unwrap().unwrap().as_ref(), b"a");
        assert_eq!(p2.try_receive(ProcessId(1)).unwrap().unwrap().as_ref(), b"b");
        assert_eq!(p2.try_receive(ProcessId(1)).unwrap(), None);
        assert_eq!(p1.try_receive(ProcessId(2)).unwrap().unwrap().as_ref(), b"c");
    }

    #[test]
    fn test_self_and_unknown_peers_are_rejected() {
        let mesh = LoopbackMesh::new(2);
        let mut p0 = mesh.transport(ProcessId(0));
        assert_eq!(
            p0.send(ProcessId(0), b"x"),
            Err(TransportError::UnknownPeer(ProcessId(0)))
        );
        assert_eq!(
            p0.try_receive(ProcessId(5)),
            Err(TransportError::UnknownPeer(ProcessId(5)))
        );
    }

    #[test]
    fn test_broken_channel_disconnects() {
        let mesh = LoopbackMesh::new(2);
        let mut p0 = mesh.transport(ProcessId(0));
        let mut p1 = mesh.transport(ProcessId(1));
        mesh.break_channel(ProcessId(0), ProcessId(1));

        assert_eq!(
            p0.send(ProcessId(1), b"x"),
            Err(TransportError::Disconnected(ProcessId(1)))
        );
        assert_eq!(
            p1.try_receive(ProcessId(0)),
            Err(TransportError::Disconnected(ProcessId(0)))
        );
        // The reverse direction still works.
        assert_eq!(p1.send(ProcessId(0), b"y"), Ok(1));
        assert_eq!(mesh.pending_for(ProcessId(0)), 1);
    }
}
