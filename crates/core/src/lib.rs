//! Core plumbing shared by every process.
//!
//! # Architecture
//!
//! ```text
//!  protocol logic ──Action──▶ Communicator ──frame──▶ Transport ──▶ peer
//!        ▲                         │
//!        └──── Dispatch ◀── barrier (wait_until / receive_any_and_dispatch)
//! ```
//!
//! - [`Transport`] is the seam to the externally provisioned channels
//! - [`Communicator`] owns the Lamport clock and stamps every envelope
//! - [`barrier`] polls peers until a condition holds for all of them while
//!   routing every received envelope through a [`Dispatch`] hook
//! - [`loopback`] is a single-threaded in-memory mesh for tests and
//!   deterministic simulation

mod action;
pub mod barrier;
mod communicator;
mod config;
pub mod loopback;
mod traits;

pub use action::Action;
pub use barrier::{
    receive_any_and_dispatch, wait_until, Condition, SatisfactionSet, WaitCondition,
};
pub use communicator::{ChannelError, ChannelStats, Communicator};
pub use config::ChannelConfig;
pub use traits::{Dispatch, Transport, TransportError};
