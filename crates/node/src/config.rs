//! Configuration for a single process.

use lamport_core::ChannelConfig;
use lamport_mutex::MutexMode;

/// Configuration for a process.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Guard each unit of work with the distributed lock.
    pub use_lock: bool,

    /// Lock protocol variant.
    pub mutex_mode: MutexMode,

    /// Polling configuration for barriers and receive loops.
    pub channel: ChannelConfig,
}

impl NodeConfig {
    /// Create a config with locking disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the lock around each unit of work.
    pub fn with_lock(mut self, use_lock: bool) -> Self {
        self.use_lock = use_lock;
        self
    }

    /// Set the lock protocol variant.
    pub fn with_mutex_mode(mut self, mode: MutexMode) -> Self {
        self.mutex_mode = mode;
        self
    }

    /// Set the channel configuration.
    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }
}
