//! # Playback Error Types
//!
//! Error types for the media cache and playback URI translation.

use core_cache::CacheError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while serving media through the cache.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Track is not available in the media cache.
    #[error("Track not cached: {0}")]
    NotCached(String),

    /// A background fetch did not produce a playable file in time.
    #[error("Fetch for {key} not viable within {timeout:?}")]
    FetchTimeout { key: String, timeout: Duration },

    /// Recency index misuse.
    #[error("Cache index error: {0}")]
    Heap(#[from] CacheError),

    // ========================================================================
    // Streaming Errors
    // ========================================================================
    /// Network streaming failed.
    #[error("Streaming failed: {0}")]
    StreamingFailed(String),

    /// The fetch was cancelled to make room for a newer request.
    #[error("Fetch cancelled")]
    Cancelled,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Cache configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::StreamingFailed(_)
                | PlaybackError::FetchTimeout { .. }
                | PlaybackError::Cancelled
        )
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::StreamingFailed(_) | PlaybackError::FetchTimeout { .. }
        )
    }
}

impl From<core_runtime::Error> for PlaybackError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::Config(msg) => PlaybackError::InvalidConfig(msg),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let timeout = PlaybackError::FetchTimeout {
            key: "tidal:track:1".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(timeout.is_transient());
        assert!(timeout.is_network_error());
        assert!(timeout.to_string().contains("tidal:track:1"));

        assert!(PlaybackError::Cancelled.is_transient());
        assert!(!PlaybackError::Cancelled.is_network_error());
        assert!(!PlaybackError::NotCached("x".to_string()).is_transient());
    }

    #[test]
    fn test_conversions() {
        let err: PlaybackError = CacheError::Empty.into();
        assert!(matches!(err, PlaybackError::Heap(CacheError::Empty)));

        let err: PlaybackError = core_runtime::Error::Config("bad size".to_string()).into();
        assert!(matches!(err, PlaybackError::InvalidConfig(msg) if msg == "bad size"));
    }
}
