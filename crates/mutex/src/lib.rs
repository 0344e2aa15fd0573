//! Distributed mutual exclusion.
//!
//! # Architecture
//!
//! [`MutexState`] is a synchronous state machine: inbound `CsRequest`,
//! `CsReply` and `CsRelease` envelopes go in, [`Action`](lamport_core::Action)s
//! come out. It never touches the transport.
//!
//! ```text
//! Inactive ──request_cs──▶ Waiting ──all replies──▶ Active ──release_cs──▶ Inactive
//! ```
//!
//! The blocking entry points in [`protocol`] drive it over a
//! [`Communicator`](lamport_core::Communicator), routing every envelope that
//! arrives while waiting through the owner's dispatch hook.
//!
//! Two modes are supported:
//!
//! - [`MutexMode::RicartAgrawala`]: reply counting with deferred replies
//! - [`MutexMode::LamportQueue`]: immediate replies, entry when the local
//!   request heads the request queue, release multicast

mod error;
pub mod protocol;
mod queue;
mod state;

pub use error::MutexError;
pub use protocol::{await_grant, release_cs, request_cs, send_request, LockOwner};
pub use queue::{DeferredReplies, RequestQueue};
pub use state::{LockState, MutexMode, MutexState};
