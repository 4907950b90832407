// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use framefx::constants::DEFAULT_BUFFER_COUNT;
use framefx::errors::ConfigError;
use framefx::{Config, FilterLocation, FilterType};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert!(config.collect_performance_statistics);
    assert!(config.use_gpu);
    assert_eq!(config.buffer_count_hint, DEFAULT_BUFFER_COUNT);
    assert_eq!(config.filter_for(FilterLocation::Photo), FilterType::PassThrough);
    assert_eq!(config.parameter_file, None);
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("framefx").join("config.json");

    let config = Config {
        video_filter: FilterType::Sobel,
        buffer_count_hint: 5,
        use_gpu: false,
        ..Config::default()
    };
    assert_eq!(config.save(Some(&path)).unwrap(), path);

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.filter_for(FilterLocation::Video), FilterType::Sobel);
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "photo_filter": "Comic" }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.photo_filter, FilterType::Comic);
    assert_eq!(config.buffer_count_hint, DEFAULT_BUFFER_COUNT);
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "photo_filter = Comic").unwrap();

    assert!(matches!(Config::load_from(&path), Err(ConfigError::Json(_))));
}
