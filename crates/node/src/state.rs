//! Per-process protocol state and the generic dispatch hook.

use crate::Workload;
use lamport_core::{ChannelError, Communicator, Dispatch, SatisfactionSet, Transport};
use lamport_messages::{Envelope, MessageType};
use lamport_mutex::{LockOwner, MutexMode, MutexState};
use lamport_types::{ProcessId, Topology};
use serde::Serialize;
use std::fmt;
use tracing::{debug, trace};

/// Lifecycle phase of a process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LifecyclePhase {
    #[default]
    Created,
    /// `Started` multicast, waiting for peers.
    Started,
    /// Every peer started; work in progress.
    Running,
    /// Own work finished and `Done` multicast.
    Done,
    /// Every worker finished.
    Terminated,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePhase::Created => "created",
            LifecyclePhase::Started => "started",
            LifecyclePhase::Running => "running",
            LifecyclePhase::Done => "done",
            LifecyclePhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Everything a process knows apart from its communicator.
///
/// Implements [`Dispatch`], so barrier loops route every envelope through
/// it. Lifecycle markers update the Done flags, lock traffic goes to the
/// mutex, domain traffic to the workload.
#[derive(Debug)]
pub struct ProcessState<W> {
    local: ProcessId,

    phase: LifecyclePhase,

    mutex: MutexState,

    /// One flag per worker, own included.
    done: SatisfactionSet,

    workload: W,

    /// Domain envelopes handed to the workload.
    domain_messages: u64,
}

impl<W: Workload> ProcessState<W> {
    /// Create the state for the local process of `topology`.
    pub fn new(topology: &Topology, mode: MutexMode, workload: W) -> Self {
        Self {
            local: topology.local(),
            phase: LifecyclePhase::Created,
            mutex: MutexState::new(topology, mode),
            done: SatisfactionSet::new(topology.workers()),
            workload,
            domain_messages: 0,
        }
    }

    pub fn local(&self) -> ProcessId {
        self.local
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Move to `phase`, logging the transition.
    pub fn set_phase(&mut self, phase: LifecyclePhase) {
        if self.phase != phase {
            debug!(
                process = self.local.0,
                from = %self.phase,
                to = %phase,
                "lifecycle transition"
            );
            self.phase = phase;
        }
    }

    pub fn workload(&self) -> &W {
        &self.workload
    }

    pub fn workload_mut(&mut self) -> &mut W {
        &mut self.workload
    }

    pub fn domain_messages(&self) -> u64 {
        self.domain_messages
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Done flags
    // ═══════════════════════════════════════════════════════════════════════════

    /// Set the Done flag of `worker`.
    pub fn mark_done(&mut self, worker: ProcessId) {
        if self.done.mark(worker) {
            trace!(process = self.local.0, worker = worker.0, "worker done");
        }
    }

    pub fn is_done(&self, worker: ProcessId) -> bool {
        self.done.is_satisfied(worker)
    }

    /// Check whether every worker has finished.
    pub fn all_done(&self) -> bool {
        self.done.is_complete()
    }

    /// Workers other than the local process whose `Done` is still outstanding.
    pub fn pending_done(&self) -> SatisfactionSet {
        SatisfactionSet::new(
            self.done
                .pending()
                .into_iter()
                .filter(|worker| *worker != self.local),
        )
    }
}

impl<W> LockOwner for ProcessState<W> {
    fn mutex(&self) -> &MutexState {
        &self.mutex
    }

    fn mutex_mut(&mut self) -> &mut MutexState {
        &mut self.mutex
    }
}

impl<T: Transport, W: Workload> Dispatch<T> for ProcessState<W> {
    fn dispatch(
        &mut self,
        comm: &mut Communicator<T>,
        envelope: &Envelope,
        from: ProcessId,
    ) -> Result<(), ChannelError> {
        match envelope.message_type() {
            MessageType::Started => {
                trace!(process = self.local.0, from = from.0, "peer started");
                Ok(())
            }
            MessageType::Done => {
                self.mark_done(from);
                Ok(())
            }
            MessageType::CsRequest | MessageType::CsReply | MessageType::CsRelease => {
                let actions = self.mutex.handle(envelope, from);
                comm.execute(actions)
            }
            MessageType::Domain(_) => {
                self.domain_messages += 1;
                self.workload.on_domain_message(envelope, from);
                Ok(())
            }
        }
    }
}
