//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process identifier.
///
/// Fixed for the lifetime of a process. Id 0 is the coordinator, every
/// other id is a worker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProcessId(pub u8);

impl ProcessId {
    /// The coordinator process.
    pub const COORDINATOR: Self = ProcessId(0);

    /// Check if this is the coordinator.
    pub fn is_coordinator(self) -> bool {
        self == Self::COORDINATOR
    }

    /// Index into per-process tables.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process({})", self.0)
    }
}

/// Lamport logical timestamp.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct LogicalTimestamp(pub u64);

impl LogicalTimestamp {
    /// Initial clock value. Never carried by a stamped envelope.
    pub const ZERO: Self = LogicalTimestamp(0);

    /// Get the raw value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Get the next timestamp, or `None` once the counter is exhausted.
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).map(LogicalTimestamp)
    }

    /// Check whether this timestamp was never stamped.
    pub fn is_unset(self) -> bool {
        self == Self::ZERO
    }
}

impl fmt::Display for LogicalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_id() {
        assert!(ProcessId::COORDINATOR.is_coordinator());
        assert!(!ProcessId(1).is_coordinator());
        assert_eq!(ProcessId(3).as_usize(), 3);
    }

    #[test]
    fn test_timestamp_ordering() {
        let t = LogicalTimestamp(4);
        assert_eq!(t.checked_next(), Some(LogicalTimestamp(5)));
        assert_eq!(LogicalTimestamp(u64::MAX).checked_next(), None);
        assert!(LogicalTimestamp::ZERO.is_unset());
        assert!(!t.is_unset());
        assert!(LogicalTimestamp(2) < LogicalTimestamp(10));
    }

    #[test]
    fn test_display() {
        assert_eq!(ProcessId(2).to_string(), "Process(2)");
        assert_eq!(LogicalTimestamp(7).to_string(), "t7");
    }
}
