//! Exploration driven from a configuration file.

use lamport_mutex::MutexMode;
use lamport_simulator::{explore, SimulatorConfig};
use std::io::Write;

#[test]
fn test_explore_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "workers = 3\nuse_lock = true\nmode = \"lamport-queue\"\nseed = 100\nseeds = 5"
    )
    .unwrap();

    let config = SimulatorConfig::load(file.path()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.mode, MutexMode::LamportQueue);

    let report = explore(&config);
    assert_eq!(report.seeds_run, 5);
    assert!(report.is_clean(), "failures: {:?}", report.failures);
    assert!(report.total_messages > 0);
}

#[test]
fn test_report_serializes() {
    let config = SimulatorConfig::new(2).with_lock(true).with_seeds(2);
    let report = explore(&config);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["workers"], 2);
    assert_eq!(json["mode"], "ricart-agrawala");
    assert_eq!(json["seeds_run"], 2);
    assert!(json["failures"].as_array().unwrap().is_empty());
}
