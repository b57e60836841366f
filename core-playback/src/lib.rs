//! # Playback Cache Module
//!
//! Serves track media from a local byte cache.
//!
//! ## Overview
//!
//! This module handles:
//! - Size-bounded media cache with background prefetch (`cache`)
//! - Streaming media over HTTP into the cache (feature `http-streaming`)
//! - Translating track URIs into playable URLs (`resolver`)

pub mod cache;
pub mod error;
pub mod resolver;

pub use cache::{CacheStats, MediaFetcher, TrackCache, TrackCacheConfig};
pub use error::{PlaybackError, Result};
pub use resolver::{MediaUrlProvider, TrackUriTranslator};
