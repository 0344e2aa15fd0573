//! Lamport logical clock.

use crate::LogicalTimestamp;
use thiserror::Error;

/// Errors raised by a [`LamportClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClockError {
    /// Advancing past the observed timestamp would overflow the counter.
    #[error("clock overflow advancing past {observed} (now {now})")]
    Overflow {
        observed: LogicalTimestamp,
        now: LogicalTimestamp,
    },
}

/// Scalar logical clock implementing Lamport's happens-before ordering.
///
/// Owned by exactly one process. The only mutation is [`advance`](Self::advance),
/// so the value never decreases.
///
/// Every outbound envelope is stamped after one `advance(ZERO)`, and every
/// inbound envelope is processed with one `advance(carried_timestamp)`.
#[derive(Debug, Clone, Default)]
pub struct LamportClock {
    now: LogicalTimestamp,
}

impl LamportClock {
    /// Create a clock reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at the given value.
    ///
    /// Used by tests and simulations to set up a specific clock reading.
    pub fn starting_at(now: LogicalTimestamp) -> Self {
        Self { now }
    }

    /// Advance past an observed timestamp: `now = max(observed, now) + 1`.
    ///
    /// On overflow the clock is left unchanged.
    pub fn advance(&mut self, observed: LogicalTimestamp) -> Result<(), ClockError> {
        self.now = observed
            .max(self.now)
            .checked_next()
            .ok_or(ClockError::Overflow {
                observed,
                now: self.now,
            })?;
        Ok(())
    }

    /// Current value.
    pub fn now(&self) -> LogicalTimestamp {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_is_strictly_increasing() {
        let mut clock = LamportClock::new();
        let observed = [0u64, 0, 7, 3, 3, 12, 1, 12];
        let mut previous = clock.now();

        for o in observed {
            clock.advance(LogicalTimestamp(o)).unwrap();
            let expected = LogicalTimestamp(o.max(previous.get()) + 1);
            assert_eq!(clock.now(), expected);
            assert!(clock.now() > previous);
            previous = clock.now();
        }
    }

    #[test]
    fn test_causality_receive_after_send() {
        let mut sender = LamportClock::starting_at(LogicalTimestamp(9));
        let mut receiver = LamportClock::new();

        sender.advance(LogicalTimestamp::ZERO).unwrap();
        let sent_at = sender.now();
        receiver.advance(sent_at).unwrap();

        assert!(receiver.now() > sent_at);
    }

    #[test]
    fn test_local_time_wins_over_stale_observation() {
        let mut clock = LamportClock::starting_at(LogicalTimestamp(20));
        clock.advance(LogicalTimestamp(5)).unwrap();
        assert_eq!(clock.now(), LogicalTimestamp(21));
    }

    #[test]
    fn test_overflow_leaves_clock_unchanged() {
        let mut clock = LamportClock::starting_at(LogicalTimestamp(3));
        let observed = LogicalTimestamp(u64::MAX);

        assert_eq!(
            clock.advance(observed),
            Err(ClockError::Overflow {
                observed,
                now: LogicalTimestamp(3),
            })
        );
        assert_eq!(clock.now(), LogicalTimestamp(3));

        clock.advance(LogicalTimestamp(u64::MAX - 1)).unwrap();
        assert_eq!(clock.now(), LogicalTimestamp(u64::MAX));
        assert!(clock.advance(LogicalTimestamp::ZERO).is_err());
        assert_eq!(clock.now(), LogicalTimestamp(u64::MAX));
    }
}
