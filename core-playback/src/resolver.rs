//! # Playback URI Translation
//!
//! Turns a logical track URI into something a player can open: a local
//! `file://` URL when the media cache has (or can quickly fetch) the track,
//! otherwise the remote stream URL.

use crate::cache::{MediaFetcher, TrackCache, TrackCacheConfig};
use crate::error::Result;
use async_trait::async_trait;
use core_runtime::config::CacheSettings;
use core_runtime::logging::redact_url;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Resolves a logical track URI to a fetchable media URL.
///
/// Implemented by the streaming API client; URLs are usually signed and
/// short-lived, so callers should resolve right before fetching.
#[async_trait]
pub trait MediaUrlProvider: Send + Sync {
    async fn media_url(&self, uri: &str) -> Result<String>;
}

/// Maps track URIs to playable URLs, going through the media cache when one
/// is configured.
pub struct TrackUriTranslator {
    provider: Arc<dyn MediaUrlProvider>,
    cache: Option<Arc<TrackCache>>,
}

impl TrackUriTranslator {
    /// Translator that always streams from the remote URL.
    pub fn new(provider: Arc<dyn MediaUrlProvider>) -> Self {
        Self {
            provider,
            cache: None,
        }
    }

    /// Route translations through `cache`.
    pub fn with_cache(mut self, cache: Arc<TrackCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build from settings, opening the media cache if it is enabled.
    pub async fn from_settings(
        settings: &CacheSettings,
        provider: Arc<dyn MediaUrlProvider>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Result<Self> {
        let translator = Self::new(provider);
        if !settings.track_cache.enabled {
            return Ok(translator);
        }

        let config = TrackCacheConfig::try_from(&settings.track_cache)?;
        let cache = TrackCache::open(config, &settings.cache_dir, fetcher).await?;
        Ok(translator.with_cache(Arc::new(cache)))
    }

    pub fn cache(&self) -> Option<&Arc<TrackCache>> {
        self.cache.as_ref()
    }

    /// URL to hand to the player for `uri`.
    ///
    /// With a cache, a cached copy is served without contacting the provider;
    /// otherwise the remote URL is resolved and fetched into the cache.
    #[instrument(skip(self))]
    pub async fn translate_uri(&self, uri: &str) -> Result<String> {
        let Some(cache) = &self.cache else {
            return self.provider.media_url(uri).await;
        };

        if let Ok(url) = cache.get_cached(uri) {
            return Ok(url);
        }

        let remote = self.provider.media_url(uri).await?;
        debug!(url = %redact_url(&remote), "Resolved remote media");
        cache.download(uri, &remote).await
    }
}
