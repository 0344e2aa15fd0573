//! Deterministic single-threaded simulation runner.

use crate::SimulationError;
use lamport_core::barrier::poll_peer;
use lamport_core::loopback::{LoopbackMesh, LoopbackTransport};
use lamport_core::{
    receive_any_and_dispatch, ChannelConfig, Communicator, SatisfactionSet, WaitCondition,
};
use lamport_messages::{Envelope, MessageType};
use lamport_mutex::{release_cs, send_request, LockOwner, MutexMode};
use lamport_node::{IterationWorkload, LifecyclePhase, ProcessState, Workload};
use lamport_types::{LogicalTimestamp, ProcessId, Topology};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, trace};

/// Configuration for a deterministic run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Number of workers; the coordinator is added on top.
    pub workers: usize,

    /// Guard each unit of work with the distributed lock.
    pub use_lock: bool,

    pub mode: MutexMode,

    /// Seed for the scheduling RNG.
    pub seed: u64,

    /// Step budget before the run is declared stuck.
    pub max_steps: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            use_lock: true,
            mode: MutexMode::RicartAgrawala,
            seed: 0,
            max_steps: 1_000_000,
        }
    }
}

impl SimulationConfig {
    /// Create a config for `workers` workers with locking enabled.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    pub fn with_lock(mut self, use_lock: bool) -> Self {
        self.use_lock = use_lock;
        self
    }

    pub fn with_mode(mut self, mode: MutexMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// Statistics from a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimulationStats {
    pub seed: u64,
    /// Steps taken, productive or not.
    pub steps: u64,
    /// Steps in which the chosen process neither received nor sent anything.
    pub idle_steps: u64,
    /// Envelopes received across all processes.
    pub messages_delivered: u64,
    /// Critical-section acquisitions per process, indexed by id.
    pub lock_entries: Vec<u64>,
    /// Units of work per process, indexed by id.
    pub iterations: Vec<u64>,
    /// Clock reading of every process at termination, indexed by id.
    pub final_clocks: Vec<LogicalTimestamp>,
}

/// Where a simulated process is in its lifecycle.
///
/// Each variant is the point a blocking call in the real driver would be
/// waiting at.
#[derive(Debug, Clone)]
enum Stage {
    /// Worker has not multicast `Started` yet.
    Announce,
    AwaitStarted(SatisfactionSet),
    /// Main loop iteration.
    Working,
    AwaitReplies {
        replies: SatisfactionSet,
        condition: WaitCondition,
    },
    /// Queue mode: replies collected, own request not yet at the head.
    AwaitHead,
    /// Holding the lock; the next step performs the work and releases.
    Critical,
    /// Coordinator waiting for `Done` markers.
    AwaitDone(SatisfactionSet),
    Terminated,
}

struct SimProcess {
    comm: Communicator<LoopbackTransport>,
    state: ProcessState<IterationWorkload>,
    stage: Stage,
}

impl SimProcess {
    fn local(&self) -> ProcessId {
        self.comm.local()
    }

    fn is_terminated(&self) -> bool {
        matches!(self.stage, Stage::Terminated)
    }
}

/// Drives a whole mesh in one thread, one process step at a time.
pub struct SimulationRunner {
    config: SimulationConfig,
    rng: ChaCha8Rng,
    processes: Vec<SimProcess>,
    steps: u64,
    idle_steps: u64,
}

impl SimulationRunner {
    /// Build a mesh of one coordinator and `config.workers` workers.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        let process_count = config.workers + 1;
        let mesh = LoopbackMesh::new(process_count);

        let mut processes = Vec::with_capacity(process_count);
        for id in 0..process_count as u8 {
            let local = ProcessId(id);
            let topology = Topology::new(local, process_count)?;
            let comm = Communicator::new(topology, mesh.transport(local), ChannelConfig::default());
            let mut state = ProcessState::new(
                &topology,
                config.mode,
                IterationWorkload::for_process(local),
            );
            let stage = if topology.is_coordinator() {
                state.set_phase(LifecyclePhase::Started);
                Stage::AwaitStarted(SatisfactionSet::for_topology(&topology))
            } else {
                Stage::Announce
            };
            processes.push(SimProcess { comm, state, stage });
        }

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            processes,
            steps: 0,
            idle_steps: 0,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Check whether every process has terminated.
    pub fn is_finished(&self) -> bool {
        self.processes.iter().all(SimProcess::is_terminated)
    }

    /// Run until every process terminates.
    pub fn run(&mut self) -> Result<SimulationStats, SimulationError> {
        info!(
            seed = self.config.seed,
            workers = self.config.workers,
            use_lock = self.config.use_lock,
            mode = %self.config.mode,
            "starting simulation"
        );

        while !self.is_finished() {
            if self.steps >= self.config.max_steps {
                return Err(SimulationError::StepLimit {
                    max_steps: self.config.max_steps,
                });
            }
            self.step()?;
        }

        let stats = self.stats();
        info!(
            seed = stats.seed,
            steps = stats.steps,
            delivered = stats.messages_delivered,
            "simulation finished"
        );
        Ok(stats)
    }

    /// Advance one randomly chosen live process by one step, then check
    /// mutual exclusion.
    pub fn step(&mut self) -> Result<(), SimulationError> {
        let live: Vec<usize> = (0..self.processes.len())
            .filter(|&i| !self.processes[i].is_terminated())
            .collect();
        if live.is_empty() {
            return Ok(());
        }

        let idx = live[self.rng.gen_range(0..live.len())];
        let use_lock = self.config.use_lock;
        let process = &mut self.processes[idx];
        let before = process.comm.stats();

        step_process(process, use_lock, &mut self.rng)?;

        let after = process.comm.stats();
        if before == after {
            self.idle_steps += 1;
        }
        self.steps += 1;

        self.check_exclusion()
    }

    fn check_exclusion(&self) -> Result<(), SimulationError> {
        let holders: Vec<ProcessId> = self
            .processes
            .iter()
            .filter(|p| p.state.mutex().is_active())
            .map(SimProcess::local)
            .collect();
        if holders.len() > 1 {
            return Err(SimulationError::SafetyViolation {
                step: self.steps,
                holders,
            });
        }
        Ok(())
    }

    /// Statistics so far.
    pub fn stats(&self) -> SimulationStats {
        SimulationStats {
            seed: self.config.seed,
            steps: self.steps,
            idle_steps: self.idle_steps,
            messages_delivered: self
                .processes
                .iter()
                .map(|p| p.comm.stats().received)
                .sum(),
            lock_entries: self
                .processes
                .iter()
                .map(|p| p.state.mutex().entries())
                .collect(),
            iterations: self
                .processes
                .iter()
                .map(|p| p.state.workload().completed())
                .collect(),
            final_clocks: self.processes.iter().map(|p| p.comm.now()).collect(),
        }
    }
}

/// Pick one unsatisfied peer at random and poll it once.
fn poll_random(
    process: &mut SimProcess,
    set: &mut SatisfactionSet,
    condition: &WaitCondition,
    rng: &mut ChaCha8Rng,
) -> Result<(), SimulationError> {
    let pending = set.pending();
    if pending.is_empty() {
        return Ok(());
    }
    let peer = pending[rng.gen_range(0..pending.len())];
    if poll_peer(&mut process.comm, peer, condition, &mut process.state)? == Some(true) {
        set.mark(peer);
    }
    Ok(())
}

/// Emit `Done` once the workload is complete.
fn finish_if_complete(process: &mut SimProcess) -> Result<(), SimulationError> {
    if !process.state.workload().is_complete() {
        return Ok(());
    }
    let local = process.local();
    let ts = process
        .comm
        .tick_multicast(Envelope::control(MessageType::Done))?;
    process.state.mark_done(local);
    process.state.set_phase(LifecyclePhase::Done);
    debug!(process = local.0, ts = ts.0, "simulated process finished its work");
    Ok(())
}

fn enter(process: &mut SimProcess) -> Result<(), SimulationError> {
    process.state.mutex_mut().grant()?;
    Ok(())
}

fn step_process(
    process: &mut SimProcess,
    use_lock: bool,
    rng: &mut ChaCha8Rng,
) -> Result<(), SimulationError> {
    let local = process.local();
    let stage = std::mem::replace(&mut process.stage, Stage::Terminated);
    trace!(process = local.0, stage = ?stage, "step");

    process.stage = match stage {
        Stage::Announce => {
            process
                .comm
                .tick_multicast(Envelope::control(MessageType::Started))?;
            process.state.set_phase(LifecyclePhase::Started);
            Stage::AwaitStarted(SatisfactionSet::for_topology(process.comm.topology()))
        }

        Stage::AwaitStarted(mut set) => {
            poll_random(
                process,
                &mut set,
                &WaitCondition::TypeIs(MessageType::Started),
                rng,
            )?;
            if !set.is_complete() {
                Stage::AwaitStarted(set)
            } else {
                process.state.set_phase(LifecyclePhase::Running);
                if process.comm.topology().is_coordinator() {
                    Stage::AwaitDone(process.state.pending_done())
                } else {
                    Stage::Working
                }
            }
        }

        Stage::Working => {
            receive_any_and_dispatch(&mut process.comm, &mut process.state)?;

            if process.state.is_done(local) {
                if process.state.all_done() {
                    process.state.set_phase(LifecyclePhase::Terminated);
                    Stage::Terminated
                } else {
                    Stage::Working
                }
            } else if process.state.workload().is_complete() {
                finish_if_complete(process)?;
                Stage::Working
            } else if use_lock {
                send_request(&mut process.comm, &mut process.state)?;
                let mutex = process.state.mutex();
                match mutex.reply_condition() {
                    Some(condition) => Stage::AwaitReplies {
                        replies: mutex.reply_set(),
                        condition,
                    },
                    None => Stage::Working,
                }
            } else {
                process.state.workload_mut().perform(local);
                finish_if_complete(process)?;
                Stage::Working
            }
        }

        Stage::AwaitReplies {
            mut replies,
            condition,
        } => {
            poll_random(process, &mut replies, &condition, rng)?;
            if !replies.is_complete() {
                Stage::AwaitReplies { replies, condition }
            } else if process.state.mutex().can_enter(&replies) {
                enter(process)?;
                Stage::Critical
            } else {
                Stage::AwaitHead
            }
        }

        Stage::AwaitHead => {
            receive_any_and_dispatch(&mut process.comm, &mut process.state)?;
            if process.state.mutex().heads_queue() {
                enter(process)?;
                Stage::Critical
            } else {
                Stage::AwaitHead
            }
        }

        Stage::Critical => {
            process.state.workload_mut().perform(local);
            release_cs(&mut process.comm, &mut process.state)?;
            finish_if_complete(process)?;
            Stage::Working
        }

        Stage::AwaitDone(mut set) => {
            poll_random(
                process,
                &mut set,
                &WaitCondition::TypeIs(MessageType::Done),
                rng,
            )?;
            if set.is_complete() {
                process.state.set_phase(LifecyclePhase::Done);
                process.state.set_phase(LifecyclePhase::Terminated);
                Stage::Terminated
            } else {
                Stage::AwaitDone(set)
            }
        }

        Stage::Terminated => Stage::Terminated,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_two_workers_terminate() {
        let mut runner = SimulationRunner::new(SimulationConfig::new(2).with_seed(7)).unwrap();
        let stats = runner.run().unwrap();

        assert!(runner.is_finished());
        assert_eq!(stats.lock_entries, vec![0, 5, 10]);
        assert_eq!(stats.iterations, vec![0, 5, 10]);
        assert!(logs_contain("simulation finished"));
    }

    #[test]
    fn test_same_seed_same_run() {
        let config = SimulationConfig::new(3)
            .with_mode(MutexMode::LamportQueue)
            .with_seed(42);
        let a = SimulationRunner::new(config.clone()).unwrap().run().unwrap();
        let b = SimulationRunner::new(config).unwrap().run().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_without_lock_nobody_enters() {
        let mut runner =
            SimulationRunner::new(SimulationConfig::new(2).with_lock(false).with_seed(3)).unwrap();
        let stats = runner.run().unwrap();
        assert_eq!(stats.lock_entries, vec![0, 0, 0]);
        assert_eq!(stats.iterations, vec![0, 5, 10]);
    }

    #[test]
    fn test_step_limit() {
        let mut runner =
            SimulationRunner::new(SimulationConfig::new(2).with_max_steps(10)).unwrap();
        assert_eq!(
            runner.run(),
            Err(SimulationError::StepLimit { max_steps: 10 })
        );
    }

    #[test]
    fn test_rejects_single_process_mesh() {
        let err = SimulationRunner::new(SimulationConfig::new(0)).err();
        assert!(matches!(err, Some(SimulationError::Topology(_))));
    }
}
