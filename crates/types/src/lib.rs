//! Core types shared by every process in the mesh.
//!
//! - [`ProcessId`] and [`LogicalTimestamp`] identify who did something and when
//! - [`LamportClock`] orders events across processes without shared time
//! - [`LockRequest`] carries the `(timestamp, id)` total order used by the lock
//! - [`Topology`] describes the fixed full-mesh membership

mod clock;
mod identifiers;
mod request;
mod topology;

pub use clock::{ClockError, LamportClock};
pub use identifiers::{LogicalTimestamp, ProcessId};
pub use request::LockRequest;
pub use topology::{Topology, TopologyError, MAX_PROCESSES};
