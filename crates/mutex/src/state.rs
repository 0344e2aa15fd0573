//! Mutual exclusion state machine.

use crate::{DeferredReplies, MutexError, RequestQueue};
use lamport_core::{
    Action, ChannelError, Communicator, Dispatch, SatisfactionSet, Transport, WaitCondition,
};
use lamport_messages::{Envelope, MessageType};
use lamport_types::{LockRequest, LogicalTimestamp, ProcessId, Topology};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, trace};

/// Lock state of one process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockState {
    /// Not holding and not requesting.
    #[default]
    Inactive,
    /// Request sent, collecting replies.
    Waiting,
    /// Holding the critical section.
    Active,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Inactive => write!(f, "inactive"),
            LockState::Waiting => write!(f, "waiting"),
            LockState::Active => write!(f, "active"),
        }
    }
}

/// Which formulation of the protocol to run.
///
/// Every process in a mesh must use the same mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutexMode {
    /// Reply counting with deferred replies.
    #[default]
    RicartAgrawala,
    /// Immediate replies; enter when the own request heads the queue and a
    /// later-stamped message has arrived from every peer. Release is
    /// multicast.
    LamportQueue,
}

impl fmt::Display for MutexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutexMode::RicartAgrawala => write!(f, "ricart-agrawala"),
            MutexMode::LamportQueue => write!(f, "lamport-queue"),
        }
    }
}

/// Lock state machine for one process.
///
/// Processes `CsRequest`, `CsReply` and `CsRelease` envelopes and returns the
/// control messages to send. The coordinator holds a disabled instance that
/// ignores all lock traffic.
#[derive(Debug, Clone)]
pub struct MutexState {
    local: ProcessId,

    /// Peers whose consent is needed: every worker except the local one.
    peers: Vec<ProcessId>,

    /// False on the coordinator.
    participant: bool,

    mode: MutexMode,

    state: LockState,

    /// Own outstanding request, set while Waiting or Active.
    own_request: Option<LockRequest>,

    queue: RequestQueue,

    deferred: DeferredReplies,

    /// Number of times the critical section was entered.
    entries: u64,
}

impl MutexState {
    /// Create the state machine for the local process of `topology`.
    pub fn new(topology: &Topology, mode: MutexMode) -> Self {
        Self {
            local: topology.local(),
            peers: topology.tracked_peers().collect(),
            participant: !topology.is_coordinator(),
            mode,
            state: LockState::Inactive,
            own_request: None,
            queue: RequestQueue::new(),
            deferred: DeferredReplies::new(),
            entries: 0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn local(&self) -> ProcessId {
        self.local
    }

    pub fn mode(&self) -> MutexMode {
        self.mode
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == LockState::Active
    }

    pub fn is_participant(&self) -> bool {
        self.participant
    }

    /// Own outstanding request.
    pub fn own_request(&self) -> Option<LockRequest> {
        self.own_request
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn deferred(&self) -> &DeferredReplies {
        &self.deferred
    }

    /// Number of completed acquisitions.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Local transitions
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record the own request stamped at `stamp` and move to Waiting.
    ///
    /// `stamp` must be the timestamp carried by the `CsRequest` multicast so
    /// every process compares the same pair.
    pub fn mark_waiting(&mut self, stamp: LogicalTimestamp) -> Result<(), MutexError> {
        if !self.participant {
            return Err(MutexError::NotParticipant(self.local));
        }
        if self.state != LockState::Inactive {
            return Err(MutexError::InvalidState { state: self.state });
        }

        let request = LockRequest::new(self.local, stamp);
        self.queue.insert(request);
        self.own_request = Some(request);
        self.state = LockState::Waiting;
        debug!(
            process = self.local.0,
            request = %request,
            mode = %self.mode,
            "requesting critical section"
        );
        Ok(())
    }

    /// Set of peers a grant waits on.
    pub fn reply_set(&self) -> SatisfactionSet {
        SatisfactionSet::new(self.peers.iter().copied())
    }

    /// Predicate a peer's message must satisfy to count toward the grant.
    ///
    /// Returns `None` unless Waiting.
    pub fn reply_condition(&self) -> Option<WaitCondition> {
        let own = self.own_request.filter(|_| self.state == LockState::Waiting)?;
        Some(match self.mode {
            MutexMode::RicartAgrawala => WaitCondition::TypeIs(MessageType::CsReply),
            MutexMode::LamportQueue => WaitCondition::TimestampAfter(own.timestamp),
        })
    }

    /// Check whether the own request heads the request queue.
    pub fn heads_queue(&self) -> bool {
        match (self.own_request, self.queue.head()) {
            (Some(own), Some(head)) => own == *head,
            _ => false,
        }
    }

    /// Check whether the local process may enter given the replies collected.
    pub fn can_enter(&self, replies: &SatisfactionSet) -> bool {
        if self.state != LockState::Waiting || !replies.is_complete() {
            return false;
        }
        match self.mode {
            MutexMode::RicartAgrawala => true,
            MutexMode::LamportQueue => self.heads_queue(),
        }
    }

    /// Move from Waiting to Active.
    pub fn grant(&mut self) -> Result<(), MutexError> {
        if self.state != LockState::Waiting {
            return Err(MutexError::InvalidState { state: self.state });
        }
        self.state = LockState::Active;
        self.entries += 1;
        info!(
            process = self.local.0,
            request = %self.own_request.map(|r| r.to_string()).unwrap_or_default(),
            entries = self.entries,
            "entered critical section"
        );
        Ok(())
    }

    /// Leave the critical section.
    ///
    /// Inactive: no-op. Waiting: rejected. Active: flushes deferred replies
    /// (or multicasts `CsRelease` in queue mode) and moves to Inactive.
    pub fn release(&mut self) -> Result<Vec<Action>, MutexError> {
        match self.state {
            LockState::Inactive => return Ok(vec![]),
            LockState::Waiting => return Err(MutexError::InvalidState { state: self.state }),
            LockState::Active => {}
        }

        self.queue.remove_process(self.local);
        self.own_request = None;
        self.state = LockState::Inactive;

        let actions = match self.mode {
            MutexMode::RicartAgrawala => self
                .deferred
                .drain()
                .into_iter()
                .map(|peer| {
                    self.queue.remove_process(peer);
                    Action::Send {
                        to: peer,
                        message_type: MessageType::CsReply,
                    }
                })
                .collect(),
            MutexMode::LamportQueue => vec![Action::Multicast {
                message_type: MessageType::CsRelease,
            }],
        };

        debug!(
            process = self.local.0,
            replies = actions.len(),
            "released critical section"
        );
        Ok(actions)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Inbound messages
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle one envelope from `from`, returning the control messages to send.
    ///
    /// Non-lock envelopes and all envelopes on the coordinator produce nothing.
    pub fn handle(&mut self, envelope: &Envelope, from: ProcessId) -> Vec<Action> {
        if !self.participant {
            return vec![];
        }
        match envelope.message_type() {
            MessageType::CsRequest => self.on_request(from, envelope.timestamp()),
            MessageType::CsReply => {
                trace!(process = self.local.0, from = from.0, "reply observed");
                vec![]
            }
            MessageType::CsRelease => self.on_release(from),
            _ => vec![],
        }
    }

    fn on_request(&mut self, from: ProcessId, timestamp: LogicalTimestamp) -> Vec<Action> {
        let request = LockRequest::new(from, timestamp);
        self.queue.insert(request);

        let reply = vec![Action::Send {
            to: from,
            message_type: MessageType::CsReply,
        }];

        if self.mode == MutexMode::LamportQueue {
            return reply;
        }

        let defer = match (self.state, self.own_request) {
            (LockState::Active, _) => true,
            (LockState::Waiting, Some(own)) => own.has_priority_over(&request),
            _ => false,
        };

        if defer {
            self.deferred.defer(from);
            trace!(process = self.local.0, request = %request, "reply deferred");
            vec![]
        } else {
            self.queue.remove_process(from);
            reply
        }
    }

    fn on_release(&mut self, from: ProcessId) -> Vec<Action> {
        if self.queue.remove_process(from) {
            trace!(process = self.local.0, from = from.0, "peer released");
        }
        vec![]
    }
}

impl<T: Transport> Dispatch<T> for MutexState {
    fn dispatch(
        &mut self,
        comm: &mut Communicator<T>,
        envelope: &Envelope,
        from: ProcessId,
    ) -> Result<(), ChannelError> {
        let actions = self.handle(envelope, from);
        comm.execute(actions)
    }
}
