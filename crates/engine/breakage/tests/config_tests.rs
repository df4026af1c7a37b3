//! Config file loading

use breakage::{BreakageConfig, BreakageError};
use tempfile::TempDir;

#[test]
fn test_save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("breakage.toml");

    let mut config = BreakageConfig::default();
    config.verbose = true;
    config.max_debris_particles = 12;
    config.fracture.joint_effect = Some("sparks".to_string());
    config.save(&path).unwrap();

    let loaded = BreakageConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_load_or_default_falls_back() {
    let dir = TempDir::new().unwrap();

    let missing = dir.path().join("missing.toml");
    assert_eq!(BreakageConfig::load_or_default(&missing), BreakageConfig::default());

    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "max_debris_particles = \"many\"").unwrap();
    assert!(matches!(BreakageConfig::load(&broken), Err(BreakageError::Parse(_))));
    assert_eq!(BreakageConfig::load_or_default(&broken), BreakageConfig::default());
}

#[test]
fn test_config_serializes_to_json() {
    let config = BreakageConfig::default();
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["spawn_class"], "BreakableDebris");
    assert_eq!(json["fracture"]["filter_angle_deg"], 20.0);
}
