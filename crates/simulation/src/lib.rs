//! Running whole meshes in one OS process.
//!
//! Two ways to run a cluster of one coordinator and N workers:
//!
//! - [`run_cluster`]: one OS thread per process over a [`MemoryFabric`] of
//!   crossbeam channels, each process running the real blocking
//!   [`Process::run`](lamport_node::Process::run) lifecycle. An
//!   [`OccupancyProbe`] wraps every workload and records overlapping units
//!   of work.
//! - [`SimulationRunner`]: every process in one thread over a
//!   [`LoopbackMesh`](lamport_core::loopback::LoopbackMesh). A seeded RNG
//!   picks which process takes the next step, exploring interleavings.
//!   Given the same seed it produces identical results every run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationRunner                       │
//! │                                                         │
//! │   ChaCha8Rng ──picks──▶ process i ──one step──▶ mesh    │
//! │                              │                          │
//! │                              ▼                          │
//! │          safety check: at most one process Active       │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod cluster;
mod error;
mod fabric;
mod probe;
mod runner;

pub use cluster::{run_cluster, ClusterConfig, ClusterReport};
pub use error::SimulationError;
pub use fabric::{MemoryFabric, MemoryTransport};
pub use probe::{CriticalSectionMonitor, OccupancyProbe};
pub use runner::{SimulationConfig, SimulationRunner, SimulationStats};
