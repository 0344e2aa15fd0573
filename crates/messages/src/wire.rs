//! Fixed-layout wire codec.
//!
//! # Wire Format
//!
//! ```text
//! [magic: u16][type: u16][payload_len: u16][timestamp: u64][payload]
//! ```
//!
//! All integers are little-endian. The sender is not encoded: it is implied
//! by the channel the frame arrives on.

use crate::{Envelope, EnvelopeError, MessageHeader, MessageType};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use lamport_types::LogicalTimestamp;

/// Magic constant that starts every envelope.
pub const MESSAGE_MAGIC: u16 = 0xAFAF;

/// Encoded header size in bytes.
pub const HEADER_LEN: usize = 2 + 2 + 2 + 8;

/// Maximum size of a whole frame.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Maximum payload size.
pub const MAX_PAYLOAD_LEN: usize = MAX_MESSAGE_LEN - HEADER_LEN;

/// Encode an envelope to a single frame.
pub fn encode(envelope: &Envelope) -> Bytes {
    let header = envelope.header();
    let mut buf = BytesMut::with_capacity(envelope.encoded_len());
    buf.put_u16_le(header.magic);
    buf.put_u16_le(header.message_type.code());
    buf.put_u16_le(header.payload_len);
    buf.put_u64_le(header.timestamp.get());
    buf.put_slice(envelope.payload());
    buf.freeze()
}

/// Decode and validate a single frame.
pub fn decode(frame: &[u8]) -> Result<Envelope, EnvelopeError> {
    if frame.len() < HEADER_LEN {
        return Err(EnvelopeError::Truncated(frame.len()));
    }

    let mut cursor = frame;
    let magic = cursor.get_u16_le();
    if magic != MESSAGE_MAGIC {
        return Err(EnvelopeError::BadMagic(magic));
    }
    let message_type = MessageType::from_code(cursor.get_u16_le());
    let payload_len = cursor.get_u16_le();
    let timestamp = LogicalTimestamp(cursor.get_u64_le());

    let declared = payload_len as usize;
    if declared > MAX_PAYLOAD_LEN {
        return Err(EnvelopeError::PayloadTooLarge {
            len: declared,
            max: MAX_PAYLOAD_LEN,
        });
    }
    if cursor.len() != declared {
        return Err(EnvelopeError::LengthMismatch {
            declared,
            actual: cursor.len(),
        });
    }

    let header = MessageHeader {
        magic,
        message_type,
        payload_len,
        timestamp,
    };
    Ok(Envelope::from_parts(header, Bytes::copy_from_slice(cursor)))
}
