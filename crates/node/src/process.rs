//! Lifecycle driver.

use crate::{LifecyclePhase, NodeConfig, NodeError, ProcessState, Workload};
use lamport_core::barrier::wait_for;
use lamport_core::{
    receive_any_and_dispatch, Communicator, Condition, Dispatch, Transport, WaitCondition,
};
use lamport_messages::{Envelope, MessageType};
use lamport_mutex::{release_cs, request_cs, LockOwner};
use lamport_types::{LogicalTimestamp, ProcessId, Topology};
use serde::Serialize;
use std::thread;
use tracing::{info, warn};

/// Summary of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub process: ProcessId,
    pub phase: LifecyclePhase,
    /// Critical-section acquisitions.
    pub lock_entries: u64,
    pub sent: u64,
    pub received: u64,
    /// Clock reading at exit.
    pub final_clock: LogicalTimestamp,
}

/// A single process: communicator plus state, driven through its lifecycle.
pub struct Process<T, W> {
    comm: Communicator<T>,
    state: ProcessState<W>,
    config: NodeConfig,
}

impl<T: Transport, W: Workload> Process<T, W> {
    /// Create a process over an already provisioned transport.
    pub fn new(topology: Topology, transport: T, workload: W, config: NodeConfig) -> Self {
        let state = ProcessState::new(&topology, config.mutex_mode, workload);
        let comm = Communicator::new(topology, transport, config.channel.clone());
        Self {
            comm,
            state,
            config,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn local(&self) -> ProcessId {
        self.comm.local()
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.state.phase()
    }

    pub fn state(&self) -> &ProcessState<W> {
        &self.state
    }

    pub fn communicator(&self) -> &Communicator<T> {
        &self.comm
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Summarize the process as it stands.
    pub fn report(&self) -> ProcessReport {
        let stats = self.comm.stats();
        ProcessReport {
            process: self.local(),
            phase: self.state.phase(),
            lock_entries: self.state.mutex().entries(),
            sent: stats.sent,
            received: stats.received,
            final_clock: self.comm.now(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Operations exposed to domain logic
    // ═══════════════════════════════════════════════════════════════════════════

    /// Stamp and send one envelope.
    pub fn tick_send(
        &mut self,
        to: ProcessId,
        envelope: Envelope,
    ) -> Result<LogicalTimestamp, NodeError> {
        Ok(self.comm.tick_send(to, envelope)?)
    }

    /// Stamp once and send to every peer.
    pub fn tick_multicast(&mut self, envelope: Envelope) -> Result<LogicalTimestamp, NodeError> {
        Ok(self.comm.tick_multicast(envelope)?)
    }

    /// Acquire the critical section, blocking until granted.
    pub fn request_cs(&mut self) -> Result<(), NodeError> {
        Ok(request_cs(&mut self.comm, &mut self.state)?)
    }

    /// Leave the critical section.
    pub fn release_cs(&mut self) -> Result<(), NodeError> {
        Ok(release_cs(&mut self.comm, &mut self.state)?)
    }

    /// Block until `condition` holds for a message from every tracked peer,
    /// dispatching everything received.
    pub fn wait_until<C: Condition + ?Sized>(&mut self, condition: &C) -> Result<(), NodeError> {
        Ok(lamport_core::wait_until(&mut self.comm, condition, &mut self.state)?)
    }

    /// Route an envelope received outside the driver's own loops.
    pub fn dispatch(&mut self, envelope: &Envelope, from: ProcessId) -> Result<(), NodeError> {
        Ok(self.state.dispatch(&mut self.comm, envelope, from)?)
    }

    /// Receive and dispatch at most one envelope without blocking.
    pub fn receive_any(&mut self) -> Result<bool, NodeError> {
        Ok(receive_any_and_dispatch(&mut self.comm, &mut self.state)?)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run the whole lifecycle to termination.
    ///
    /// Any transport failure is fatal and returned as is.
    pub fn run(&mut self) -> Result<ProcessReport, NodeError> {
        let result = if self.comm.topology().is_coordinator() {
            self.run_coordinator()
        } else {
            self.run_worker()
        };

        if let Err(e) = &result {
            warn!(process = self.local().0, phase = %self.phase(), error = %e, "process failed");
        }
        result.map(|()| self.report())
    }

    fn run_coordinator(&mut self) -> Result<(), NodeError> {
        self.state.set_phase(LifecyclePhase::Started);
        self.wait_until(&WaitCondition::TypeIs(MessageType::Started))?;
        info!(process = self.local().0, ts = self.comm.now().0, "received all started messages");
        self.state.set_phase(LifecyclePhase::Running);

        let pending = self.state.pending_done();
        wait_for(
            &mut self.comm,
            pending,
            &WaitCondition::TypeIs(MessageType::Done),
            &mut self.state,
        )?;
        info!(process = self.local().0, ts = self.comm.now().0, "received all done messages");

        self.state.set_phase(LifecyclePhase::Done);
        self.state.set_phase(LifecyclePhase::Terminated);
        Ok(())
    }

    fn run_worker(&mut self) -> Result<(), NodeError> {
        let local = self.local();

        let ts = self.tick_multicast(Envelope::control(MessageType::Started))?;
        self.state.set_phase(LifecyclePhase::Started);
        info!(process = local.0, ts = ts.0, "process started");

        self.wait_until(&WaitCondition::TypeIs(MessageType::Started))?;
        self.state.set_phase(LifecyclePhase::Running);
        info!(process = local.0, ts = self.comm.now().0, "received all started messages");

        while !self.state.all_done() {
            let received = self.receive_any()?;

            if self.state.is_done(local) {
                if !received {
                    thread::sleep(self.config.channel.poll_interval);
                }
                continue;
            }

            if !self.state.workload().is_complete() {
                self.perform_unit()?;
            }

            if self.state.workload().is_complete() {
                let ts = self.tick_multicast(Envelope::control(MessageType::Done))?;
                self.state.mark_done(local);
                self.state.set_phase(LifecyclePhase::Done);
                info!(process = local.0, ts = ts.0, "process finished its work");
            }
        }

        info!(process = local.0, ts = self.comm.now().0, "received all done messages");
        self.state.set_phase(LifecyclePhase::Terminated);
        Ok(())
    }

    /// One unit of work, inside the critical section when locking is enabled.
    fn perform_unit(&mut self) -> Result<(), NodeError> {
        let local = self.local();
        if self.config.use_lock {
            self.request_cs()?;
        }
        self.state.workload_mut().perform(local);
        if self.config.use_lock {
            self.release_cs()?;
        }
        Ok(())
    }
}
