//! Envelope construction and validation.

use crate::wire::{MAX_PAYLOAD_LEN, MESSAGE_MAGIC};
use crate::MessageType;
use bytes::Bytes;
use lamport_types::LogicalTimestamp;
use thiserror::Error;

/// Errors that can occur while building or decoding an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Payload exceeds the fixed bound.
    #[error("payload of {len} bytes exceeds maximum of {max}")]
    PayloadTooLarge {
        /// Offending payload length.
        len: usize,
        /// Maximum payload length.
        max: usize,
    },

    /// Frame shorter than a header.
    #[error("frame of {0} bytes is shorter than the header")]
    Truncated(usize),

    /// Magic constant did not validate.
    #[error("bad magic {0:#06x}")]
    BadMagic(u16),

    /// Domain type reusing the wire code of an interpreted type.
    #[error("domain type code {0} is reserved")]
    ReservedType(u16),

    /// Declared payload length disagrees with the frame.
    #[error("header declares {declared} payload bytes but frame carries {actual}")]
    LengthMismatch {
        /// Length from the header.
        declared: usize,
        /// Bytes actually present after the header.
        actual: usize,
    },
}

/// Fixed envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Always [`MESSAGE_MAGIC`] for a valid envelope.
    pub magic: u16,
    /// Message type tag.
    pub message_type: MessageType,
    /// Payload length in bytes, at most [`MAX_PAYLOAD_LEN`].
    pub payload_len: u16,
    /// Logical send time; unset (zero) until stamped.
    pub timestamp: LogicalTimestamp,
}

/// A message: fixed header plus bounded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    header: MessageHeader,
    payload: Bytes,
}

impl Envelope {
    /// Build an envelope with an unset timestamp.
    ///
    /// Fails with [`EnvelopeError::PayloadTooLarge`] instead of truncating,
    /// and with [`EnvelopeError::ReservedType`] for a domain type that would
    /// decode as a lifecycle or lock message.
    pub fn build(
        message_type: MessageType,
        payload: impl Into<Bytes>,
    ) -> Result<Self, EnvelopeError> {
        if message_type.is_reserved_domain() {
            return Err(EnvelopeError::ReservedType(message_type.code()));
        }
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(EnvelopeError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self {
            header: MessageHeader {
                magic: MESSAGE_MAGIC,
                message_type,
                payload_len: payload.len() as u16,
                timestamp: LogicalTimestamp::ZERO,
            },
            payload,
        })
    }

    /// Build a payload-less control envelope (lifecycle or mutex).
    ///
    /// The type is normalized through its wire code, so the envelope holds
    /// the type a receiver will decode.
    pub fn control(message_type: MessageType) -> Self {
        Self {
            header: MessageHeader {
                magic: MESSAGE_MAGIC,
                message_type: MessageType::from_code(message_type.code()),
                payload_len: 0,
                timestamp: LogicalTimestamp::ZERO,
            },
            payload: Bytes::new(),
        }
    }

    /// Reassemble an envelope from a validated header and payload.
    pub(crate) fn from_parts(header: MessageHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Set the logical timestamp.
    pub fn stamp(&mut self, timestamp: LogicalTimestamp) {
        self.header.timestamp = timestamp;
    }

    /// Get the header.
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    /// Get the message type.
    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    /// Get the logical timestamp.
    pub fn timestamp(&self) -> LogicalTimestamp {
        self.header.timestamp
    }

    /// Get the payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Total encoded size: header plus payload.
    pub fn encoded_len(&self) -> usize {
        crate::HEADER_LEN + self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_leaves_timestamp_unset() {
        let envelope = Envelope::build(MessageType::Domain(4), vec![1, 2, 3]).unwrap();
        assert_eq!(envelope.header().magic, MESSAGE_MAGIC);
        assert_eq!(envelope.header().payload_len, 3);
        assert!(envelope.timestamp().is_unset());
    }

    #[test]
    fn test_payload_at_bound_is_accepted() {
        let envelope = Envelope::build(MessageType::Domain(4), vec![0u8; MAX_PAYLOAD_LEN]);
        assert!(envelope.is_ok());
    }

    #[test]
    fn test_payload_over_bound_is_rejected() {
        let result = Envelope::build(MessageType::Domain(4), vec![0u8; MAX_PAYLOAD_LEN + 1]);
        assert_eq!(
            result,
            Err(EnvelopeError::PayloadTooLarge {
                len: MAX_PAYLOAD_LEN + 1,
                max: MAX_PAYLOAD_LEN,
            })
        );
    }

    #[test]
    fn test_domain_type_with_reserved_code_is_rejected() {
        for code in [0u16, 1, 6, 7, 8] {
            assert_eq!(
                Envelope::build(MessageType::Domain(code), &b"transfer"[..]),
                Err(EnvelopeError::ReservedType(code))
            );
        }
        assert!(Envelope::build(MessageType::Domain(2), &b"transfer"[..]).is_ok());
    }

    #[test]
    fn test_control_normalizes_type() {
        let envelope = Envelope::control(MessageType::Domain(1));
        assert_eq!(envelope.message_type(), MessageType::Done);
    }

    #[test]
    fn test_control_envelope_is_empty() {
        let mut envelope = Envelope::control(MessageType::CsRequest);
        envelope.stamp(LogicalTimestamp(3));
        assert!(envelope.payload().is_empty());
        assert_eq!(envelope.timestamp(), LogicalTimestamp(3));
        assert_eq!(envelope.encoded_len(), crate::HEADER_LEN);
    }
}
