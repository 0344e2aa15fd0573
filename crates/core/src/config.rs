//! Configuration for channel polling.

use std::time::Duration;

/// Configuration for the communicator and barrier loops.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Sleep after a full polling round that received nothing.
    ///
    /// Bounds the latency added to any wait while keeping idle processes
    /// from spinning.
    pub poll_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_micros(500),
        }
    }
}

impl ChannelConfig {
    /// Create a config with a custom poll interval.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}
