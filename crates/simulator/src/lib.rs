//! Lamport mutex simulator.
//!
//! Command-line front end over `lamport-simulation`.
//!
//! # Architecture
//!
//! - **Configuration**: [`SimulatorConfig`], loaded from TOML and overridden
//!   by command-line flags
//! - **Threaded runs**: one OS thread per process, reporting whether any two
//!   units of work overlapped
//! - **Exploration**: the deterministic runner over a range of seeds,
//!   reporting every seed that violated mutual exclusion or stalled
//!
//! # Example
//!
//! ```ignore
//! use lamport_simulator::{explore, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(3).with_lock(true).with_seeds(100);
//! let report = explore(&config);
//! assert!(report.is_clean());
//! ```

pub mod config;
pub mod logging;
pub mod report;

pub use config::{ConfigError, SimulatorConfig, MAX_WORKERS};
pub use report::{explore, ExploreReport, SeedFailure};
