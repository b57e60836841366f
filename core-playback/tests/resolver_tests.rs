//! Tests for playback URI translation

use async_trait::async_trait;
use core_playback::cache::{MediaFetcher, TrackCache, TrackCacheConfig};
use core_playback::{MediaUrlProvider, PlaybackError, Result, TrackUriTranslator};
use core_runtime::config::CacheSettings;
use mockall::mock;
use mockall::predicate::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub UrlProvider {}

    #[async_trait]
    impl MediaUrlProvider for UrlProvider {
        async fn media_url(&self, uri: &str) -> Result<String>;
    }
}

mock! {
    pub Fetcher {}

    #[async_trait]
    impl MediaFetcher for Fetcher {
        async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64>;
    }
}

const URI: &str = "tidal:track:1234";
const REMOTE: &str = "https://cdn.example/1234.flac?token=abc";

fn writing_fetcher(times: usize) -> MockFetcher {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_to_file()
        .with(eq(REMOTE), always())
        .times(times)
        .returning(|_, dest| {
            std::fs::write(dest, b"flac")?;
            Ok(4)
        });
    fetcher
}

fn resolving_provider(times: usize) -> MockUrlProvider {
    let mut provider = MockUrlProvider::new();
    provider
        .expect_media_url()
        .with(eq(URI))
        .times(times)
        .returning(|_| Ok(REMOTE.to_string()));
    provider
}

#[tokio::test]
async fn test_without_cache_returns_remote_url() {
    let translator = TrackUriTranslator::new(Arc::new(resolving_provider(1)));

    assert!(translator.cache().is_none());
    assert_eq!(translator.translate_uri(URI).await.unwrap(), REMOTE);
}

#[tokio::test]
async fn test_cache_miss_fetches_then_hits() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrackCacheConfig::new().with_viability_timeout(Duration::from_secs(2));
    let cache = TrackCache::open(config, dir.path(), Arc::new(writing_fetcher(1)))
        .await
        .unwrap();
    let cache = Arc::new(cache);

    // The provider is only consulted on the first, uncached request.
    let translator =
        TrackUriTranslator::new(Arc::new(resolving_provider(1))).with_cache(cache.clone());

    let first = translator.translate_uri(URI).await.unwrap();
    assert!(first.starts_with("file://"));
    assert!(cache.cached(URI));

    let second = translator.translate_uri(URI).await.unwrap();
    assert_eq!(first, second);

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn test_provider_error_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let cache = TrackCache::open(
        TrackCacheConfig::default(),
        dir.path(),
        Arc::new(writing_fetcher(0)),
    )
    .await
    .unwrap();

    let mut provider = MockUrlProvider::new();
    provider
        .expect_media_url()
        .returning(|uri| Err(PlaybackError::NotCached(uri.to_string())));

    let translator = TrackUriTranslator::new(Arc::new(provider)).with_cache(Arc::new(cache));
    let err = translator.translate_uri(URI).await.unwrap_err();
    assert!(matches!(err, PlaybackError::NotCached(_)));
}

#[tokio::test]
async fn test_from_settings_respects_enabled_flag() {
    let dir = tempfile::tempdir().unwrap();

    let disabled = CacheSettings::builder().cache_dir(dir.path()).build().unwrap();
    let translator = TrackUriTranslator::from_settings(
        &disabled,
        Arc::new(resolving_provider(0)),
        Arc::new(writing_fetcher(0)),
    )
    .await
    .unwrap();
    assert!(translator.cache().is_none());

    let enabled = CacheSettings::builder()
        .cache_dir(dir.path())
        .track_cache_enabled(true)
        .track_cache_directory("media")
        .track_cache_size("10M")
        .build()
        .unwrap();
    let translator = TrackUriTranslator::from_settings(
        &enabled,
        Arc::new(resolving_provider(0)),
        Arc::new(writing_fetcher(0)),
    )
    .await
    .unwrap();

    let cache = translator.cache().unwrap();
    assert_eq!(cache.config().max_cache_size_bytes, 10_000_000);
    assert!(cache.directory().ends_with("media"));
    assert!(dir.path().join("media").is_dir());
}
