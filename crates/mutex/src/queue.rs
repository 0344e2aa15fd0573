//! Request bookkeeping: the priority-ordered request queue and the set of
//! peers whose replies are withheld.

use lamport_types::{LockRequest, ProcessId};
use std::collections::BTreeSet;

/// Outstanding lock requests ordered by `(timestamp, process)`.
///
/// Each process has at most one outstanding request, so inserting a second
/// request for the same process replaces the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQueue {
    requests: BTreeSet<LockRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request, replacing any earlier one from the same process.
    pub fn insert(&mut self, request: LockRequest) {
        self.remove_process(request.process);
        self.requests.insert(request);
    }

    /// Remove the request of `process`. Returns true if one was queued.
    pub fn remove_process(&mut self, process: ProcessId) -> bool {
        let before = self.requests.len();
        self.requests.retain(|r| r.process != process);
        self.requests.len() != before
    }

    /// Highest-priority request.
    pub fn head(&self) -> Option<&LockRequest> {
        self.requests.first()
    }

    /// Request queued for `process`, if any.
    pub fn get(&self, process: ProcessId) -> Option<&LockRequest> {
        self.requests.iter().find(|r| r.process == process)
    }

    /// Requests in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &LockRequest> {
        self.requests.iter()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Peers owed a `CsReply` once the local process releases.
///
/// A peer is in the set at most once; draining clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeferredReplies {
    peers: BTreeSet<ProcessId>,
}

impl DeferredReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Withhold the reply to `peer`. Returns true if it was not already withheld.
    pub fn defer(&mut self, peer: ProcessId) -> bool {
        self.peers.insert(peer)
    }

    pub fn contains(&self, peer: ProcessId) -> bool {
        self.peers.contains(&peer)
    }

    /// Take every withheld peer in ascending order, clearing the set.
    pub fn drain(&mut self) -> Vec<ProcessId> {
        std::mem::take(&mut self.peers).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
