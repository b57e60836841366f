//! Integration tests for settings loading and logging setup

use core_runtime::config::{parse_size, CacheSettings};
use core_runtime::logging::{init_logging, redact_url, LogFormat, LogLevel, LoggingConfig};
use std::fs;

#[test]
fn test_settings_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");
    let file = dir.path().join("cache.json");
    fs::write(
        &file,
        format!(
            r#"{{
                "cache_dir": {:?},
                "track_cache": {{ "enabled": true, "max_size": "1.5 GB", "timeout_secs": 3 }},
                "object_cache": {{ "max_items_ram": 256, "persist": false }}
            }}"#,
            cache_dir
        ),
    )
    .unwrap();

    let json = fs::read_to_string(&file).unwrap();
    let settings = CacheSettings::from_json(&json).unwrap();

    assert_eq!(settings.cache_dir, cache_dir);
    assert!(settings.track_cache.enabled);
    assert_eq!(settings.track_cache.max_size_bytes().unwrap(), 1_500_000_000);
    assert_eq!(settings.track_cache.timeout_secs, 3);
    assert_eq!(settings.track_cache.max_concurrent_downloads, 2);
    assert_eq!(settings.object_cache.max_items_ram, 256);
    assert!(!settings.object_cache.persist);
    assert_eq!(settings.object_cache.directory, "cache");
}

#[test]
fn test_settings_round_trip_through_json() {
    let settings = CacheSettings::builder()
        .cache_dir("/srv/cache")
        .track_cache_size("20k")
        .build()
        .unwrap();

    let json = serde_json::to_string(&settings).unwrap();
    assert_eq!(CacheSettings::from_json(&json).unwrap(), settings);
}

#[test]
fn test_size_parsing_matches_config_values() {
    assert_eq!(parse_size("300M").unwrap(), 300_000_000);
    assert_eq!(parse_size("  2 tb ").unwrap(), 2_000_000_000_000);
}

#[test]
fn test_logging_initializes_once() {
    // A process can only install one global subscriber.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    init_logging(config.clone()).unwrap();
    tracing::debug!(url = %redact_url("https://cdn/x.flac?sig=1"), "logged after init");

    assert!(init_logging(config).is_err());
}

#[test]
fn test_invalid_filter_is_config_error() {
    let config = LoggingConfig::default().with_filter("core_cache=loud");
    let err = init_logging(config).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}
