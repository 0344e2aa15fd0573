//! Critical-section request ordering.

use crate::{LogicalTimestamp, ProcessId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A request for the critical section.
///
/// Requests are totally ordered by timestamp ascending, then process id
/// ascending. The smaller request has priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockRequest {
    /// Process that issued the request.
    pub process: ProcessId,
    /// Timestamp stamped on the request.
    pub timestamp: LogicalTimestamp,
}

impl LockRequest {
    /// Create a new request.
    pub fn new(process: ProcessId, timestamp: LogicalTimestamp) -> Self {
        Self { process, timestamp }
    }

    /// Check if this request wins against `other` under the total order.
    pub fn has_priority_over(&self, other: &LockRequest) -> bool {
        self < other
    }
}

impl Ord for LockRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.process.cmp(&other.process))
    }
}

impl PartialOrd for LockRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.timestamp.0, self.process.0)
    }
}
