//! Message envelope for the process mesh.
//!
//! Every message travels as a fixed header followed by a bounded payload:
//!
//! ```text
//! ┌────────┬────────┬─────────────┬───────────────┬──────────────┐
//! │ magic  │ type   │ payload_len │ timestamp     │ payload      │
//! │ u16 LE │ u16 LE │ u16 LE      │ u64 LE        │ ≤ 4082 bytes │
//! └────────┴────────┴─────────────┴───────────────┴──────────────┘
//! ```
//!
//! Lifecycle and mutex message types are interpreted by this workspace;
//! every other type code is forwarded opaquely to domain logic.

mod envelope;
mod message_type;
pub mod wire;

pub use envelope::{Envelope, EnvelopeError, MessageHeader};
pub use message_type::MessageType;
pub use wire::{HEADER_LEN, MAX_MESSAGE_LEN, MAX_PAYLOAD_LEN, MESSAGE_MAGIC};
