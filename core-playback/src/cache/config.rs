//! Cache configuration and policies

use crate::error::{PlaybackError, Result};
use core_runtime::config::TrackCacheSettings;
use std::time::Duration;

/// Bytes a partial download needs before playback can start on it.
pub const DEFAULT_VIABLE_BYTES: u64 = 1 << 18;

/// Configuration for the media byte cache.
#[derive(Debug, Clone)]
pub struct TrackCacheConfig {
    /// Maximum bytes of complete entries kept on disk (default: 300MB)
    pub max_cache_size_bytes: u64,

    /// Subdirectory of the base cache directory holding media files
    pub cache_directory: String,

    /// How long `download` waits for the file to become viable (default: 1s)
    pub viability_timeout: Duration,

    /// Number of concurrent background fetches allowed (default: 2)
    pub max_concurrent_downloads: usize,

    /// Size a partial file must exceed to be handed out (default: 256KiB)
    pub viable_bytes: u64,

    /// Interval between viability checks (default: 10ms)
    pub poll_interval: Duration,

    /// Time a cancelled fetch gets to stop before it is aborted (default: 1s)
    pub cancel_grace: Duration,
}

impl Default for TrackCacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size_bytes: 300_000_000,
            cache_directory: "track_cache".to_string(),
            viability_timeout: Duration::from_secs(1),
            max_concurrent_downloads: 2,
            viable_bytes: DEFAULT_VIABLE_BYTES,
            poll_interval: Duration::from_millis(10),
            cancel_grace: Duration::from_secs(1),
        }
    }
}

impl TrackCacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum cache size.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_cache_size_bytes = bytes;
        self
    }

    /// Set cache directory name.
    pub fn with_cache_directory(mut self, dir: impl Into<String>) -> Self {
        self.cache_directory = dir.into();
        self
    }

    pub fn with_viability_timeout(mut self, timeout: Duration) -> Self {
        self.viability_timeout = timeout;
        self
    }

    /// Set maximum concurrent downloads.
    pub fn with_max_concurrent_downloads(mut self, count: usize) -> Self {
        self.max_concurrent_downloads = count;
        self
    }

    pub fn with_viable_bytes(mut self, bytes: u64) -> Self {
        self.viable_bytes = bytes;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_cache_size_bytes == 0 {
            return Err(PlaybackError::InvalidConfig(
                "max_cache_size_bytes must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_downloads == 0 {
            return Err(PlaybackError::InvalidConfig(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }

        if self.cache_directory.is_empty() {
            return Err(PlaybackError::InvalidConfig(
                "cache_directory cannot be empty".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(PlaybackError::InvalidConfig(
                "poll_interval must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl TryFrom<&TrackCacheSettings> for TrackCacheConfig {
    type Error = PlaybackError;

    fn try_from(settings: &TrackCacheSettings) -> Result<Self> {
        let config = Self::default()
            .with_max_size(settings.max_size_bytes()?)
            .with_cache_directory(settings.directory.clone())
            .with_viability_timeout(settings.timeout())
            .with_max_concurrent_downloads(settings.max_concurrent_downloads);
        config.validate()?;
        Ok(config)
    }
}
