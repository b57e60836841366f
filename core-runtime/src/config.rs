//! # Cache Configuration Module
//!
//! Provides the configuration surface consumed by the caching layers.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `CacheSettings` instance. Values are validated when the builder is
//! finished so a misconfigured cache fails at startup rather than on first
//! use. Settings can also be deserialized from JSON, with every field except
//! `cache_dir` optional.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CacheSettings;
//!
//! let settings = CacheSettings::builder()
//!     .cache_dir("/var/cache/tidal")
//!     .track_cache_enabled(true)
//!     .track_cache_size("500M")
//!     .max_items_ram(512)
//!     .build()
//!     .expect("valid settings");
//!
//! assert_eq!(settings.track_cache.max_size_bytes().unwrap(), 500_000_000);
//! ```
//!
//! ## Error Handling
//!
//! The builder returns actionable error messages:
//!
//! ```should_panic
//! use core_runtime::config::CacheSettings;
//!
//! // Missing cache directory
//! let settings = CacheSettings::builder()
//!     .build()
//!     .expect("Should fail - missing cache_dir");
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for both cache tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Base directory under which every cache subdirectory is created
    pub cache_dir: PathBuf,

    /// Media byte cache for fetched audio
    #[serde(default)]
    pub track_cache: TrackCacheSettings,

    /// Persistent cache for remote API objects
    #[serde(default)]
    pub object_cache: ObjectCacheSettings,
}

/// Settings for the on-disk media cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackCacheSettings {
    /// Whether playback goes through the cache at all
    pub enabled: bool,

    /// Human-readable size ceiling, e.g. "300M" or "2g"
    pub max_size: String,

    /// Subdirectory of `cache_dir` holding media files
    pub directory: String,

    /// Seconds a download may take to become playable
    pub timeout_secs: u64,

    /// Background downloads allowed at once
    pub max_concurrent_downloads: usize,
}

impl Default for TrackCacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: "300M".to_string(),
            directory: "track_cache".to_string(),
            timeout_secs: 1,
            max_concurrent_downloads: 2,
        }
    }
}

impl TrackCacheSettings {
    /// Size ceiling in bytes.
    pub fn max_size_bytes(&self) -> Result<u64> {
        parse_size(&self.max_size)
    }

    /// Viability timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size_bytes()? == 0 {
            return Err(Error::Config(
                "track_cache.max_size must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config(
                "track_cache.max_concurrent_downloads must be at least 1".to_string(),
            ));
        }

        validate_directory("track_cache.directory", &self.directory)
    }
}

/// Settings for the persistent object cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectCacheSettings {
    /// Entries kept in memory; 0 means unbounded
    pub max_items_ram: usize,

    /// Whether entries are written through to disk
    pub persist: bool,

    /// Subdirectory of `cache_dir` holding entry files
    pub directory: String,

    /// Whether reads count as a touch for eviction order
    pub refresh_on_read: bool,
}

impl Default for ObjectCacheSettings {
    fn default() -> Self {
        Self {
            max_items_ram: 0,
            persist: true,
            directory: "cache".to_string(),
            refresh_on_read: false,
        }
    }
}

impl ObjectCacheSettings {
    pub fn validate(&self) -> Result<()> {
        validate_directory("object_cache.directory", &self.directory)
    }
}

impl CacheSettings {
    /// Creates a new builder for constructing `CacheSettings`.
    pub fn builder() -> CacheSettingsBuilder {
        CacheSettingsBuilder::default()
    }

    /// Parse and validate settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: CacheSettings = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid cache settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates the settings and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        self.track_cache.validate()?;
        self.object_cache.validate()
    }
}

fn validate_directory(field: &str, directory: &str) -> Result<()> {
    if directory.is_empty() {
        return Err(Error::Config(format!("{} cannot be empty", field)));
    }

    if directory.contains('/') || directory.contains('\\') || directory == ".." {
        return Err(Error::Config(format!(
            "{} must be a single directory name, got {:?}",
            field, directory
        )));
    }

    Ok(())
}

/// Parse a human-readable size into bytes.
///
/// Units are decimal (`k` = 1000) and case-insensitive; anything after the
/// unit letter is ignored, so "300M", "300 mb" and "0.3g" are all 300 MB.
pub fn parse_size(input: &str) -> Result<u64> {
    let lowered = input.trim().to_ascii_lowercase();
    let number_len = lowered
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(lowered.len());
    let (number, rest) = lowered.split_at(number_len);

    if !number.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(Error::Config(format!("Invalid size: {:?}", input)));
    }

    let value: f64 = number
        .trim_end_matches('.')
        .parse()
        .map_err(|_| Error::Config(format!("Invalid size: {:?}", input)))?;

    let multiplier = match rest.trim_start().chars().next() {
        Some('k') => 1e3,
        Some('m') => 1e6,
        Some('g') => 1e9,
        Some('t') => 1e12,
        _ => 1.0,
    };

    Ok((value * multiplier) as u64)
}

/// Builder for constructing [`CacheSettings`] instances.
#[derive(Debug, Default)]
pub struct CacheSettingsBuilder {
    cache_dir: Option<PathBuf>,
    track_cache: TrackCacheSettings,
    object_cache: ObjectCacheSettings,
}

impl CacheSettingsBuilder {
    /// Sets the base cache directory (required).
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn track_cache_enabled(mut self, enabled: bool) -> Self {
        self.track_cache.enabled = enabled;
        self
    }

    /// Sets the media cache ceiling, e.g. "300M".
    pub fn track_cache_size(mut self, size: impl Into<String>) -> Self {
        self.track_cache.max_size = size.into();
        self
    }

    pub fn track_cache_directory(mut self, directory: impl Into<String>) -> Self {
        self.track_cache.directory = directory.into();
        self
    }

    pub fn track_cache_timeout_secs(mut self, secs: u64) -> Self {
        self.track_cache.timeout_secs = secs;
        self
    }

    pub fn max_concurrent_downloads(mut self, count: usize) -> Self {
        self.track_cache.max_concurrent_downloads = count;
        self
    }

    pub fn max_items_ram(mut self, count: usize) -> Self {
        self.object_cache.max_items_ram = count;
        self
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.object_cache.persist = persist;
        self
    }

    pub fn object_cache_directory(mut self, directory: impl Into<String>) -> Self {
        self.object_cache.directory = directory.into();
        self
    }

    pub fn refresh_on_read(mut self, refresh: bool) -> Self {
        self.object_cache.refresh_on_read = refresh;
        self
    }

    /// Builds and validates the final settings.
    pub fn build(self) -> Result<CacheSettings> {
        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;

        let settings = CacheSettings {
            cache_dir,
            track_cache: self.track_cache,
            object_cache: self.object_cache,
        };

        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("300M").unwrap(), 300_000_000);
        assert_eq!(parse_size("300m").unwrap(), 300_000_000);
        assert_eq!(parse_size("300 MB").unwrap(), 300_000_000);
        assert_eq!(parse_size("1.5k").unwrap(), 1_500);
        assert_eq!(parse_size("2G").unwrap(), 2_000_000_000);
        assert_eq!(parse_size("1t").unwrap(), 1_000_000_000_000);
        assert_eq!(parse_size("4096").unwrap(), 4096);
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("M").is_err());
        assert!(parse_size(".5k").is_err());
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_default_settings() {
        let track = TrackCacheSettings::default();
        assert!(!track.enabled);
        assert_eq!(track.max_size_bytes().unwrap(), 300_000_000);
        assert_eq!(track.directory, "track_cache");
        assert_eq!(track.timeout(), Duration::from_secs(1));
        assert_eq!(track.max_concurrent_downloads, 2);

        let objects = ObjectCacheSettings::default();
        assert_eq!(objects.max_items_ram, 0);
        assert!(objects.persist);
        assert_eq!(objects.directory, "cache");
        assert!(!objects.refresh_on_read);
    }

    #[test]
    fn test_builder_requires_cache_dir() {
        let err = CacheSettings::builder().build().unwrap_err();
        assert!(err.to_string().contains("cache_dir"));
    }

    #[test]
    fn test_builder_overrides() {
        let settings = CacheSettings::builder()
            .cache_dir("/tmp/cache")
            .track_cache_enabled(true)
            .track_cache_size("1g")
            .track_cache_directory("tracks")
            .track_cache_timeout_secs(5)
            .max_concurrent_downloads(3)
            .max_items_ram(8)
            .persist(false)
            .object_cache_directory("objects")
            .refresh_on_read(true)
            .build()
            .unwrap();

        assert!(settings.track_cache.enabled);
        assert_eq!(settings.track_cache.max_size_bytes().unwrap(), 1_000_000_000);
        assert_eq!(settings.track_cache.directory, "tracks");
        assert_eq!(settings.track_cache.timeout_secs, 5);
        assert_eq!(settings.track_cache.max_concurrent_downloads, 3);
        assert_eq!(settings.object_cache.max_items_ram, 8);
        assert!(!settings.object_cache.persist);
        assert_eq!(settings.object_cache.directory, "objects");
        assert!(settings.object_cache.refresh_on_read);
    }

    #[test]
    fn test_validation_failures() {
        let base = || CacheSettings::builder().cache_dir("/tmp/cache");

        assert!(base().track_cache_size("0").build().is_err());
        assert!(base().track_cache_size("huge").build().is_err());
        assert!(base().max_concurrent_downloads(0).build().is_err());
        assert!(base().track_cache_directory("").build().is_err());
        assert!(base().object_cache_directory("a/b").build().is_err());
        assert!(base().object_cache_directory("..").build().is_err());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let settings = CacheSettings::from_json(
            r#"{"cache_dir": "/tmp/cache", "track_cache": {"enabled": true, "max_size": "50M"}}"#,
        )
        .unwrap();

        assert!(settings.track_cache.enabled);
        assert_eq!(settings.track_cache.max_size_bytes().unwrap(), 50_000_000);
        assert_eq!(settings.track_cache.directory, "track_cache");
        assert_eq!(settings.object_cache, ObjectCacheSettings::default());
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(CacheSettings::from_json("{}").is_err());
        assert!(CacheSettings::from_json(
            r#"{"cache_dir": "/tmp", "track_cache": {"max_concurrent_downloads": 0}}"#
        )
        .is_err());
    }
}
