//! Configuration types for the simulator.

use lamport_core::ChannelConfig;
use lamport_mutex::MutexMode;
use lamport_node::NodeConfig;
use lamport_simulation::{ClusterConfig, SimulationConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Largest worker count a mesh of at most 16 processes allows.
pub const MAX_WORKERS: usize = 15;

/// Errors loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("worker count {0} out of range (1..={max})", max = MAX_WORKERS)]
    InvalidWorkers(usize),

    #[error("seed count must be at least 1")]
    NoSeeds,
}

/// Configuration for a simulator run.
///
/// Every field has a default, so a TOML file only needs the keys it
/// overrides. Command-line flags are applied on top of the file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Number of worker processes (the coordinator is added on top).
    pub workers: usize,

    /// Guard each unit of work with the distributed lock.
    pub use_lock: bool,

    /// Lock protocol variant.
    pub mode: MutexMode,

    /// Sleep after an idle polling round, in microseconds.
    pub poll_interval_us: u64,

    /// First seed for deterministic exploration.
    pub seed: u64,

    /// Number of consecutive seeds to explore.
    pub seeds: u64,

    /// Step budget per explored seed.
    pub max_steps: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            use_lock: false,
            mode: MutexMode::default(),
            poll_interval_us: 500,
            seed: 0,
            seeds: 1,
            max_steps: 1_000_000,
        }
    }
}

impl SimulatorConfig {
    /// Create a configuration for `workers` workers.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Enable or disable locking.
    pub fn with_lock(mut self, use_lock: bool) -> Self {
        self.use_lock = use_lock;
        self
    }

    /// Set the lock protocol variant.
    pub fn with_mode(mut self, mode: MutexMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the first exploration seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of seeds to explore.
    pub fn with_seeds(mut self, seeds: u64) -> Self {
        self.seeds = seeds;
        self
    }

    /// Check ranges the file format cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkers(self.workers));
        }
        if self.seeds == 0 {
            return Err(ConfigError::NoSeeds);
        }
        Ok(())
    }

    /// Per-process configuration.
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig::new()
            .with_lock(self.use_lock)
            .with_mutex_mode(self.mode)
            .with_channel(ChannelConfig::with_poll_interval(Duration::from_micros(
                self.poll_interval_us,
            )))
    }

    /// Convert to a threaded cluster configuration.
    pub fn to_cluster_config(&self) -> ClusterConfig {
        ClusterConfig::new(self.workers).with_node(self.node_config())
    }

    /// Convert to a deterministic runner configuration for one seed.
    pub fn to_simulation_config(&self, seed: u64) -> SimulationConfig {
        SimulationConfig::new(self.workers)
            .with_lock(self.use_lock)
            .with_mode(self.mode)
            .with_seed(seed)
            .with_max_steps(self.max_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = SimulatorConfig::from_toml_str(
            r#"
            workers = 5
            use_lock = true
            mode = "lamport-queue"
            "#,
        )
        .unwrap();

        assert_eq!(config.workers, 5);
        assert!(config.use_lock);
        assert_eq!(config.mode, MutexMode::LamportQueue);
        assert_eq!(config.poll_interval_us, 500);
        assert_eq!(config.seeds, 1);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = SimulatorConfig::from_toml_str("processes = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = 2\nseed = 17\nseeds = 4").unwrap();

        let config = SimulatorConfig::load(file.path()).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.seed, 17);
        assert_eq!(config.to_simulation_config(18).seed, 18);
    }

    #[test]
    fn test_missing_file() {
        let err = SimulatorConfig::load(Path::new("/nonexistent/lamport.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_worker_range() {
        assert!(SimulatorConfig::new(1).validate().is_ok());
        assert!(SimulatorConfig::new(MAX_WORKERS).validate().is_ok());
        assert!(matches!(
            SimulatorConfig::new(0).validate(),
            Err(ConfigError::InvalidWorkers(0))
        ));
        assert!(matches!(
            SimulatorConfig::new(16).validate(),
            Err(ConfigError::InvalidWorkers(16))
        ));
        assert!(matches!(
            SimulatorConfig::new(2).with_seeds(0).validate(),
            Err(ConfigError::NoSeeds)
        ));
    }

    #[test]
    fn test_node_config_carries_flags() {
        let node = SimulatorConfig::new(2)
            .with_lock(true)
            .with_mode(MutexMode::LamportQueue)
            .node_config();
        assert!(node.use_lock);
        assert_eq!(node.mutex_mode, MutexMode::LamportQueue);
        assert_eq!(node.channel.poll_interval, Duration::from_micros(500));
    }
}
