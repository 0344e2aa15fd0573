//! Threaded in-memory channel fabric.

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use lamport_core::{Transport, TransportError};
use lamport_types::ProcessId;

/// A full mesh of unbounded crossbeam channels, one per ordered pair.
///
/// The fabric keeps both ends of every channel alive, so a process that
/// exits never disconnects the peers still draining its queue. Drop the
/// fabric once every process has terminated.
pub struct MemoryFabric {
    process_count: usize,
    /// `senders[from][to]`; `None` on the diagonal.
    senders: Vec<Vec<Option<Sender<Bytes>>>>,
    /// `receivers[to][from]`; `None` on the diagonal.
    receivers: Vec<Vec<Option<Receiver<Bytes>>>>,
}

impl MemoryFabric {
    /// Open N×(N−1) channels.
    pub fn new(process_count: usize) -> Self {
        let mut senders: Vec<Vec<Option<Sender<Bytes>>>> =
            (0..process_count).map(|_| vec![None; process_count]).collect();
        let mut receivers: Vec<Vec<Option<Receiver<Bytes>>>> =
            (0..process_count).map(|_| vec![None; process_count]).collect();

        for from in 0..process_count {
            for to in 0..process_count {
                if from == to {
                    continue;
                }
                let (tx, rx) = channel::unbounded();
                senders[from][to] = Some(tx);
                receivers[to][from] = Some(rx);
            }
        }

        Self {
            process_count,
            senders,
            receivers,
        }
    }

    pub fn process_count(&self) -> usize {
        self.process_count
    }

    /// Endpoint for process `id`: its outbound senders and inbound receivers.
    pub fn transport(&self, id: ProcessId) -> MemoryTransport {
        let idx = id.as_usize();
        MemoryTransport {
            outbound: self.senders.get(idx).cloned().unwrap_or_default(),
            inbound: self.receivers.get(idx).cloned().unwrap_or_default(),
        }
    }

    /// Frames queued toward `to` from every sender.
    pub fn pending_for(&self, to: ProcessId) -> usize {
        self.receivers
            .get(to.as_usize())
            .map(|row| row.iter().flatten().map(Receiver::len).sum())
            .unwrap_or(0)
    }
}

/// One process's endpoint on a [`MemoryFabric`].
#[derive(Debug)]
pub struct MemoryTransport {
    outbound: Vec<Option<Sender<Bytes>>>,
    inbound: Vec<Option<Receiver<Bytes>>>,
}

impl Transport for MemoryTransport {
    fn send(&mut self, to: ProcessId, frame: &[u8]) -> Result<usize, TransportError> {
        let sender = self
            .outbound
            .get(to.as_usize())
            .and_then(Option::as_ref)
            .ok_or(TransportError::UnknownPeer(to))?;
        sender
            .send(Bytes::copy_from_slice(frame))
            .map_err(|_| TransportError::Disconnected(to))?;
        Ok(frame.len())
    }

    fn try_receive(&mut self, from: ProcessId) -> Result<Option<Bytes>, TransportError> {
        let receiver = self
            .inbound
            .get(from.as_usize())
            .and_then(Option::as_ref)
            .ok_or(TransportError::UnknownPeer(from))?;
        match receiver.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Disconnected(from)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_frames_cross_threads_in_order() {
        let fabric = MemoryFabric::new(2);
        let mut p0 = fabric.transport(ProcessId(0));
        let mut p1 = fabric.transport(ProcessId(1));

        let handle = thread::spawn(move || {
            for i in 0..10u8 {
                p1.send(ProcessId(0), &[i]).unwrap();
            }
        });
        handle.join().unwrap();

        let mut received = Vec::new();
        while let Some(frame) = p0.try_receive(ProcessId(1)).unwrap() {
            received.push(frame[0]);
        }
        assert_eq!(received, (0..10).collect::<Vec<u8>>());
    }

    #[test]
    fn test_exited_peer_does_not_disconnect() {
        let fabric = MemoryFabric::new(3);
        let mut p1 = fabric.transport(ProcessId(1));
        {
            let mut p2 = fabric.transport(ProcessId(2));
            p2.send(ProcessId(1), b"last").unwrap();
        }
        assert_eq!(fabric.pending_for(ProcessId(1)), 1);
        assert_eq!(
            p1.try_receive(ProcessId(2)).unwrap().unwrap().as_ref(),
            b"last"
        );
        assert_eq!(p1.try_receive(ProcessId(2)).unwrap(), None);
    }

    #[test]
    fn test_unknown_peer() {
        let fabric = MemoryFabric::new(2);
        let mut p0 = fabric.transport(ProcessId(0));
        assert_eq!(
            p0.send(ProcessId(0), b"x"),
            Err(TransportError::UnknownPeer(ProcessId(0)))
        );
        assert_eq!(
            p0.try_receive(ProcessId(4)),
            Err(TransportError::UnknownPeer(ProcessId(4)))
        );
    }
}
