//! Message type tags.

use std::fmt;

/// Type tag carried in every envelope header.
///
/// Wire codes for the interpreted types are fixed; any other code is an
/// externally-owned domain type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════
    /// Process finished initialization.
    Started,

    /// Process finished its work.
    Done,

    // ═══════════════════════════════════════════════════════════════════════
    // Mutual exclusion
    // ═══════════════════════════════════════════════════════════════════════
    /// Request for the critical section.
    CsRequest,

    /// Permission to enter the critical section.
    CsReply,

    /// Critical section released (queue-based bookkeeping).
    CsRelease,

    // ═══════════════════════════════════════════════════════════════════════
    // Domain
    // ═══════════════════════════════════════════════════════════════════════
    /// Opaque type owned by domain logic.
    Domain(u16),
}

impl MessageType {
    /// Wire code for `Started`.
    pub const STARTED_CODE: u16 = 0;
    /// Wire code for `Done`.
    pub const DONE_CODE: u16 = 1;
    /// Wire code for `CsRequest`.
    pub const CS_REQUEST_CODE: u16 = 6;
    /// Wire code for `CsReply`.
    pub const CS_REPLY_CODE: u16 = 7;
    /// Wire code for `CsRelease`.
    pub const CS_RELEASE_CODE: u16 = 8;

    /// Check if `code` belongs to an interpreted type.
    pub fn is_reserved_code(code: u16) -> bool {
        matches!(
            code,
            Self::STARTED_CODE
                | Self::DONE_CODE
                | Self::CS_REQUEST_CODE
                | Self::CS_REPLY_CODE
                | Self::CS_RELEASE_CODE
        )
    }

    /// Decode a wire code.
    pub fn from_code(code: u16) -> Self {
        match code {
            Self::STARTED_CODE => MessageType::Started,
            Self::DONE_CODE => MessageType::Done,
            Self::CS_REQUEST_CODE => MessageType::CsRequest,
            Self::CS_REPLY_CODE => MessageType::CsReply,
            Self::CS_RELEASE_CODE => MessageType::CsRelease,
            other => MessageType::Domain(other),
        }
    }

    /// Encode to a wire code.
    pub fn code(self) -> u16 {
        match self {
            MessageType::Started => Self::STARTED_CODE,
            MessageType::Done => Self::DONE_CODE,
            MessageType::CsRequest => Self::CS_REQUEST_CODE,
            MessageType::CsReply => Self::CS_REPLY_CODE,
            MessageType::CsRelease => Self::CS_RELEASE_CODE,
            MessageType::Domain(code) => code,
        }
    }

    /// Get a human-readable name for this message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            MessageType::Started => "STARTED",
            MessageType::Done => "DONE",
            MessageType::CsRequest => "CS_REQUEST",
            MessageType::CsReply => "CS_REPLY",
            MessageType::CsRelease => "CS_RELEASE",
            MessageType::Domain(_) => "DOMAIN",
        }
    }

    /// Check if this is a lifecycle message.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, MessageType::Started | MessageType::Done)
    }

    /// Check if this is a mutual-exclusion message.
    pub fn is_mutex(&self) -> bool {
        matches!(
            self,
            MessageType::CsRequest | MessageType::CsReply | MessageType::CsRelease
        )
    }

    /// Check if this is a domain type whose code collides with an
    /// interpreted type and would decode as that type.
    pub fn is_reserved_domain(&self) -> bool {
        matches!(self, MessageType::Domain(code) if Self::is_reserved_code(*code))
    }

    /// Check if this is an opaque domain message.
    pub fn is_domain(&self) -> bool {
        matches!(self, MessageType::Domain(_))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Domain(code) => write!(f, "DOMAIN({})", code),
            other => f.write_str(other.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpreted_codes_are_stable() {
        assert_eq!(MessageType::Started.code(), 0);
        assert_eq!(MessageType::Done.code(), 1);
        assert_eq!(MessageType::CsRequest.code(), 6);
        assert_eq!(MessageType::CsReply.code(), 7);
        assert_eq!(MessageType::CsRelease.code(), 8);
    }

    #[test]
    fn test_unknown_codes_are_domain() {
        // Unassigned codes pass through untouched.
        for code in [2u16, 3, 4, 5, 9, 500] {
            let ty = MessageType::from_code(code);
            assert_eq!(ty, MessageType::Domain(code));
            assert!(ty.is_domain());
            assert_eq!(ty.code(), code);
        }
    }

    #[test]
    fn test_classification() {
        assert!(MessageType::Started.is_lifecycle());
        assert!(MessageType::CsReply.is_mutex());
        assert!(!MessageType::Done.is_mutex());
        assert_eq!(MessageType::Domain(4).to_string(), "DOMAIN(4)");
        assert_eq!(MessageType::CsRequest.to_string(), "CS_REQUEST");
    }

    #[test]
    fn test_reserved_domain_codes() {
        for code in [0u16, 1, 6, 7, 8] {
            assert!(MessageType::is_reserved_code(code));
            assert!(MessageType::Domain(code).is_reserved_domain());
        }
        assert!(!MessageType::Domain(2).is_reserved_domain());
        assert!(!MessageType::Done.is_reserved_domain());
    }
}
