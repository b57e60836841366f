//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};

/// Point-in-time statistics about the media cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Complete entries tracked for eviction
    pub tracked_entries: usize,

    /// Bytes on disk across tracked entries
    pub total_bytes: u64,

    /// Background fetches still running
    pub in_flight: usize,

    /// `get_cached` calls served from disk
    pub hits: u64,

    /// `get_cached` calls that found nothing
    pub misses: u64,

    /// Entries deleted by trim passes
    pub evictions: u64,

    /// Fetches cancelled to make room for newer requests
    pub cancelled_downloads: u64,

    /// Timestamp when stats were calculated
    pub calculated_at: i64,
}

impl CacheStats {
    /// Calculate cache usage as a percentage of max size.
    pub fn usage_percentage(&self, max_size: u64) -> f64 {
        if max_size == 0 {
            return 0.0;
        }

        (self.total_bytes as f64 / max_size as f64) * 100.0
    }

    /// Returns true if the cache is full (>=100%).
    pub fn is_full(&self, max_size: u64) -> bool {
        self.total_bytes >= max_size
    }

    /// Bytes the next trim pass has to free.
    pub fn space_needed(&self, max_size: u64) -> u64 {
        self.total_bytes.saturating_sub(max_size)
    }

    /// Share of lookups answered from disk, as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }

        (self.hits as f64 / lookups as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage() {
        let stats = CacheStats {
            tracked_entries: 3,
            total_bytes: 240_000_000,
            ..Default::default()
        };

        let max_size = 300_000_000;
        assert_eq!(stats.usage_percentage(max_size), 80.0);
        assert!(!stats.is_full(max_size));
        assert_eq!(stats.space_needed(max_size), 0);

        assert!(stats.is_full(200_000_000));
        assert_eq!(stats.space_needed(200_000_000), 40_000_000);
        assert_eq!(stats.usage_percentage(0), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);

        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 75.0);
    }
}
