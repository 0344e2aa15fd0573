//! Per-process composition of clock, lock and lifecycle.
//!
//! This crate composes the communicator, the mutual exclusion state machine
//! and a pluggable [`Workload`] into a complete process.
//!
//! # Architecture
//!
//! - [`ProcessState`] is the generic dispatch hook: every received envelope
//!   is routed through it, lifecycle markers update the Done flags, lock
//!   traffic goes to the mutex and domain traffic to the workload
//! - [`Process`] owns the communicator and drives the lifecycle
//!   (`Created → Started → Running → Done → Terminated`)
//! - Process 0 is the coordinator: it never takes the lock and only
//!   observes `Started` and `Done`

mod config;
mod error;
mod process;
mod state;
mod workload;

pub use config::NodeConfig;
pub use error::NodeError;
pub use process::{Process, ProcessReport};
pub use state::{LifecyclePhase, ProcessState};
pub use workload::{IterationWorkload, Workload};
