//! Cache behaviour tests

use super::*;
use joinless_core::ScanStrategy;
use tempfile::{tempdir, TempDir};

const CSV: &str = "Feature,Instance,LocX,LocY,Checkin\n\
                   A,1,0.0,0.0,3\n\
                   A,2,5.0,0.0,1\n\
                   B,1,1.0,0.0,7\n";

fn setup(threshold: f64) -> (CacheConfig, TempDir) {
    let dir = tempdir().unwrap();
    let csv_path = dir.path().join("instances.csv");
    fs::write(&csv_path, CSV).unwrap();
    let config = CacheConfig::new(csv_path, dir.path().join("cache").join("instances.jlds"), threshold);
    (config, dir)
}

#[test]
fn test_missing_cache_builds_and_writes() {
    let (config, _dir) = setup(2.0);
    let outcome = load_or_build(&config).unwrap();

    assert_eq!(outcome.status, CacheStatus::Missing);
    assert_eq!(outcome.dataset.registry().len(), 3);
    assert_eq!(outcome.dataset.graph().len(), 1);
    assert!(config.cache_path.exists());
    assert!(!tmp_path(&config.cache_path).exists());
}

#[test]
fn test_second_load_is_a_hit() {
    let (config, _dir) = setup(2.0);
    let first = load_or_build(&config).unwrap();

    // the CSV is not consulted on a hit
    fs::remove_file(&config.csv_path).unwrap();
    let second = load_or_build(&config).unwrap();

    assert!(second.status.is_hit());
    assert_eq!(second.dataset.graph(), first.dataset.graph());
    assert_eq!(second.dataset.stars(), first.dataset.stars());
}

#[test]
fn test_threshold_change_rebuilds() {
    let (mut config, _dir) = setup(2.0);
    load_or_build(&config).unwrap();

    config.threshold = 6.0;
    let outcome = load_or_build(&config).unwrap();
    assert_eq!(
        outcome.status,
        CacheStatus::ThresholdMismatch {
            cached: 2.0,
            requested: 6.0
        }
    );
    assert_eq!(outcome.dataset.graph().len(), 3);

    // the refreshed cache now matches
    assert!(load_or_build(&config).unwrap().status.is_hit());
}

#[test]
fn test_corrupt_cache_falls_back_to_csv() {
    let (config, _dir) = setup(2.0);
    load_or_build(&config).unwrap();

    let mut bytes = fs::read(&config.cache_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&config.cache_path, bytes).unwrap();

    let outcome = load_or_build(&config).unwrap();
    assert_eq!(outcome.status, CacheStatus::Corrupt);
    assert_eq!(outcome.dataset.graph().len(), 1);
    assert!(load_dataset(&config.cache_path).is_ok());
}

#[test]
fn test_forced_rebuild_ignores_cache() {
    let (mut config, _dir) = setup(2.0);
    load_or_build(&config).unwrap();

    config.force_rebuild = true;
    config.build = BuildOptions::sequential().with_strategy(ScanStrategy::Grid);
    let outcome = load_or_build(&config).unwrap();
    assert_eq!(outcome.status, CacheStatus::Forced);
    assert_eq!(outcome.dataset.graph().len(), 1);
}

#[test]
fn test_invalid_threshold_surfaces_error() {
    let (config, _dir) = setup(0.0);
    let err = load_or_build(&config).unwrap_err();
    assert!(format!("{err:#}").contains("threshold"));
    assert!(!config.cache_path.exists());
}

#[test]
fn test_missing_csv_surfaces_error() {
    let (config, _dir) = setup(2.0);
    fs::remove_file(&config.csv_path).unwrap();
    let err = load_or_build(&config).unwrap_err();
    assert!(format!("{err:#}").contains("failed to load instances"));
}

#[test]
fn test_config_from_json_uses_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("joinless.json");
    fs::write(
        &path,
        r#"{ "csv_path": "data.csv", "threshold": 12.5, "build": { "strategy": "grid" } }"#,
    )
    .unwrap();

    let config = CacheConfig::from_json_file(&path).unwrap();
    assert_eq!(config.csv_path, PathBuf::from("data.csv"));
    assert_eq!(config.threshold, 12.5);
    assert_eq!(config.build.strategy, ScanStrategy::Grid);
    assert!(config.build.parallel);
    assert!(!config.force_rebuild);
    assert_eq!(config.cache_path, CacheConfig::default().cache_path);
}
