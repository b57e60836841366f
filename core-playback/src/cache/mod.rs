//! # Media Cache Module
//!
//! On-disk cache of fetched audio, bounded by total bytes.
//!
//! ## Overview
//!
//! Key features:
//! - Files addressed by the MD5 digest of the track key
//! - Background fetches with a bounded worker pool; excess fetches are
//!   cancelled oldest first
//! - Playback can start once a partial file passes a viability threshold
//! - Least recently used eviction driven by a [`RecencyHeap`](core_cache::RecencyHeap)
//! - Crash recovery of interrupted fetches on open
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     TrackCache                         │
//! │  - get_cached() / download() / get()   │
//! │  - trim()                              │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> RecencyHeap (eviction order)
//!          ├──> FetchPool (background workers)
//!          └──> MediaFetcher (bytes from URL to file)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{HttpMediaFetcher, TrackCache, TrackCacheConfig};
//! use std::sync::Arc;
//!
//! # async fn example(url: &str) -> core_playback::Result<()> {
//! let fetcher = Arc::new(HttpMediaFetcher::new()?);
//! let cache = TrackCache::open(TrackCacheConfig::default(), "/var/cache/app", fetcher).await?;
//!
//! let local = cache.get("tidal:track:1234", url).await?;
//! println!("Play {}", local);
//!
//! let stats = cache.stats();
//! println!("Cache size: {} MB", stats.total_bytes / 1_000_000);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod fetcher;
pub mod manager;
pub mod pool;
pub mod stats;

// Re-export commonly used types
pub use config::TrackCacheConfig;
#[cfg(feature = "http-streaming")]
pub use fetcher::HttpMediaFetcher;
pub use fetcher::MediaFetcher;
pub use manager::{entry_name, TrackCache};
pub use pool::{Admission, FetchOutcome, FetchPool};
pub use stats::CacheStats;
