//! # Track Cache
//!
//! Size-bounded on-disk cache of fetched media.
//!
//! Each entry is a file named by the MD5 hex digest of its logical key. A
//! companion `<digest>.dirty` sentinel exists while a background fetch
//! writes the file; only entries whose fetch completed are registered in the
//! recency index and count against the byte ceiling.
//!
//! Foreground calls never wait on the network except `download`, which polls
//! the target file until it is large enough to start playback or the
//! viability timeout expires.

use crate::cache::{
    config::TrackCacheConfig,
    fetcher::MediaFetcher,
    pool::{discard, Admission, FetchOutcome, FetchPool},
    stats::CacheStats,
};
use crate::error::{PlaybackError, Result};
use core_cache::{CacheError, RecencyHeap};
use core_runtime::logging::{redact_url, strip_path};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Suffix of the in-flight marker next to a data file.
pub const SENTINEL_SUFFIX: &str = "dirty";

/// On-disk file name for `key`.
pub fn entry_name(key: &str) -> String {
    format!("{:x}", md5::compute(key.as_bytes()))
}

fn sentinel_for(path: &Path) -> PathBuf {
    path.with_extension(SENTINEL_SUFFIX)
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// State shared between the foreground and background workers.
struct Shared {
    index: Mutex<RecencyHeap<PathBuf>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Shared {
    /// Record a completed fetch as the most recently touched entry.
    fn register(&self, path: PathBuf) {
        let mut index = self.index.lock();
        let result = if index.contains(&path) {
            index.move_to_top(&path)
        } else {
            index.push(path)
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to register fetched entry");
        }
    }

    fn is_tracked(&self, path: &Path) -> bool {
        self.index.lock().contains(path)
    }

    /// Stop treating `path` as complete while a worker rewrites it.
    fn untrack(&self, path: &Path) {
        match self.index.lock().remove(path) {
            Ok(()) | Err(CacheError::NotFound(_)) => {}
            Err(e) => warn!(error = %e, "Failed to untrack entry"),
        }
    }
}

/// Media byte cache with background prefetch.
pub struct TrackCache {
    config: TrackCacheConfig,
    dir: PathBuf,
    shared: Arc<Shared>,
    pool: FetchPool,
    fetcher: Arc<dyn MediaFetcher>,
}

impl TrackCache {
    /// Open the cache under `base_dir/<cache_directory>`.
    ///
    /// Interrupted fetches from a previous run (a sentinel plus whatever data
    /// it guarded) are deleted. Remaining files are tracked oldest access
    /// time first, then trimmed to the configured ceiling.
    #[instrument(skip_all, fields(dir = %config.cache_directory))]
    pub async fn open(
        config: TrackCacheConfig,
        base_dir: impl AsRef<Path>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Result<Self> {
        config.validate()?;

        let dir = base_dir.as_ref().join(&config.cache_directory);
        tokio::fs::create_dir_all(&dir).await?;
        let dir = tokio::fs::canonicalize(&dir).await?;

        let (recovered, existing) = recover(&dir).await?;
        let seeded = existing.len();
        let index: RecencyHeap<PathBuf> = existing.into_iter().collect();

        let cache = Self {
            pool: FetchPool::new(config.max_concurrent_downloads, config.cancel_grace),
            config,
            dir,
            shared: Arc::new(Shared {
                index: Mutex::new(index),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
            fetcher,
        };

        let evicted = cache.trim();
        info!(
            recovered,
            seeded,
            evicted,
            max_bytes = cache.config.max_cache_size_bytes,
            "Track cache ready"
        );
        Ok(cache)
    }

    pub fn config(&self) -> &TrackCacheConfig {
        &self.config
    }

    /// Canonical directory holding the media files.
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Where the data for `key` lives, whether or not it is cached.
    pub fn cache_path(&self, key: &str) -> PathBuf {
        self.dir.join(entry_name(key))
    }

    /// Returns `true` if a completed entry for `key` is tracked.
    pub fn cached(&self, key: &str) -> bool {
        self.shared.is_tracked(&self.cache_path(key))
    }

    /// Serve a completed entry, marking it most recently used.
    ///
    /// Fails with [`PlaybackError::NotCached`] if `key` has no completed
    /// entry. No network access.
    pub fn get_cached(&self, key: &str) -> Result<String> {
        let path = self.cache_path(key);

        match self.shared.index.lock().move_to_top(&path) {
            Ok(()) => {}
            Err(CacheError::NotFound(_)) => {
                self.shared.misses.fetch_add(1, Ordering::Relaxed);
                return Err(PlaybackError::NotCached(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        if !path.is_file() {
            self.shared.untrack(&path);
            self.shared.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Tracked entry vanished");
            return Err(PlaybackError::NotCached(key.to_string()));
        }

        self.shared.hits.fetch_add(1, Ordering::Relaxed);
        self.trim();
        debug!(key, "Track cache hit");
        Ok(file_url(&path))
    }

    /// Start a background fetch of `url` for `key` and wait until the file is
    /// playable.
    ///
    /// Running fetches beyond the concurrency limit are cancelled oldest
    /// first. A fetch already running for `key` is reused. Fails with
    /// [`PlaybackError::FetchTimeout`] if the file does not become viable in
    /// time; the fetch keeps running in the background.
    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    pub async fn download(&self, key: &str, url: &str) -> Result<String> {
        let path = self.cache_path(key);
        let sentinel = sentinel_for(&path);

        let worker = {
            let shared = Arc::clone(&self.shared);
            let fetcher = Arc::clone(&self.fetcher);
            let url = url.to_string();
            let path = path.clone();
            let sentinel = sentinel.clone();
            move |token| fetch_worker(shared, fetcher, url, path, sentinel, token)
        };

        // Any existing copy is rewritten; it stops counting as complete now.
        self.shared.untrack(&path);

        match self.pool.launch(path.clone(), sentinel, worker).await {
            Admission::Started { cancelled } if cancelled > 0 => {
                debug!(cancelled, "Cancelled older fetches to start a new one");
            }
            Admission::Started { .. } => debug!("Fetch started"),
            Admission::AlreadyRunning => debug!("Fetch already running"),
        }

        self.trim();
        self.wait_until_viable(key, &path).await?;
        Ok(file_url(&path))
    }

    /// [`get_cached`](Self::get_cached), falling back to
    /// [`download`](Self::download) on a miss.
    pub async fn get(&self, key: &str, url: &str) -> Result<String> {
        match self.get_cached(key) {
            Err(PlaybackError::NotCached(_)) => self.download(key, url).await,
            other => other,
        }
    }

    /// Delete least recently used entries until the tracked bytes fit the
    /// ceiling. Returns the number of entries deleted.
    ///
    /// Entries whose file disappeared are dropped from the index.
    pub fn trim(&self) -> usize {
        let mut index = self.shared.index.lock();

        let mut sizes = HashMap::with_capacity(index.len());
        for path in index.entries() {
            match fs::metadata(&path) {
                Ok(meta) => {
                    sizes.insert(path, meta.len());
                }
                Err(_) => {
                    debug!(file = %strip_path(&path.to_string_lossy()), "Tracked entry vanished");
                    let _ = index.remove(&path);
                }
            }
        }

        let mut total: u64 = sizes.values().sum();
        let mut evicted = 0;
        while total > self.config.max_cache_size_bytes {
            let Ok(victim) = index.pop() else { break };
            total = total.saturating_sub(sizes.get(&victim).copied().unwrap_or(0));

            match fs::remove_file(&victim) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(error = %e, "Failed to delete evicted entry"),
            }
            debug!(file = %strip_path(&victim.to_string_lossy()), "Evicted track");
            evicted += 1;
        }

        if evicted > 0 {
            self.shared
                .evictions
                .fetch_add(evicted as u64, Ordering::Relaxed);
        }
        evicted
    }

    /// Snapshot of the cache counters and tracked bytes.
    pub fn stats(&self) -> CacheStats {
        let tracked = self.shared.index.lock().entries();
        let total_bytes = tracked
            .iter()
            .filter_map(|path| fs::metadata(path).ok())
            .map(|meta| meta.len())
            .sum();

        CacheStats {
            tracked_entries: tracked.len(),
            total_bytes,
            in_flight: self.pool.len(),
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
            evictions: self.shared.evictions.load(Ordering::Relaxed),
            cancelled_downloads: self.pool.cancelled(),
            calculated_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Cancel all background fetches and remove their partial files.
    pub async fn shutdown(&self) {
        let running = self.pool.len();
        self.pool.shutdown().await;
        if running > 0 {
            info!(cancelled = running, "Track cache shut down");
        }
    }

    async fn wait_until_viable(&self, key: &str, path: &Path) -> Result<()> {
        let deadline = Instant::now() + self.config.viability_timeout;

        loop {
            if self.is_viable(path).await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PlaybackError::FetchTimeout {
                    key: key.to_string(),
                    timeout: self.config.viability_timeout,
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Big enough to start playback, or complete.
    async fn is_viable(&self, path: &Path) -> bool {
        if self.shared.is_tracked(path) {
            return true;
        }
        match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len() > self.config.viable_bytes,
            Err(_) => false,
        }
    }
}

/// Body of one background fetch.
async fn fetch_worker(
    shared: Arc<Shared>,
    fetcher: Arc<dyn MediaFetcher>,
    url: String,
    path: PathBuf,
    sentinel: PathBuf,
    token: CancellationToken,
) -> FetchOutcome {
    let claimed = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&sentinel)
        .await;
    match claimed {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!(file = ?sentinel.file_name(), "Fetch already owned by another worker");
            return FetchOutcome::Skipped;
        }
        Err(e) => {
            warn!(error = %e, "Failed to create fetch sentinel");
            return FetchOutcome::Failed;
        }
    }
    shared.untrack(&path);

    let result = tokio::select! {
        _ = token.cancelled() => Err(PlaybackError::Cancelled),
        result = fetcher.fetch_to_file(&url, &path) => result,
    };

    let outcome = match result {
        Ok(bytes) => {
            shared.register(path);
            FetchOutcome::Completed(bytes)
        }
        Err(PlaybackError::Cancelled) => {
            shared.untrack(&path);
            discard(&path).await;
            FetchOutcome::Cancelled
        }
        Err(e) => {
            warn!(url = %redact_url(&url), error = %e, "Background fetch failed");
            shared.untrack(&path);
            discard(&path).await;
            FetchOutcome::Failed
        }
    };

    discard(&sentinel).await;
    outcome
}

/// Delete interrupted fetches and list the remaining entries, least recently
/// accessed first.
async fn recover(dir: &Path) -> Result<(usize, Vec<PathBuf>)> {
    let mut files = Vec::new();
    let mut sentinels = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let meta = match entry.metadata().await {
            Ok(meta) if meta.is_file() => meta,
            _ => continue,
        };
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == SENTINEL_SUFFIX) {
            sentinels.push(path);
        } else {
            let accessed = meta
                .accessed()
                .or_else(|_| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((accessed, path));
        }
    }

    let mut orphans: Vec<PathBuf> = Vec::with_capacity(sentinels.len());
    for sentinel in &sentinels {
        let data = sentinel.with_extension("");
        discard(&data).await;
        discard(sentinel).await;
        orphans.push(data);
    }
    if !sentinels.is_empty() {
        info!(count = sentinels.len(), "Removed interrupted fetches");
    }

    files.retain(|(_, path)| !orphans.contains(path));
    files.sort_by_key(|(accessed, _)| *accessed);

    Ok((
        sentinels.len(),
        files.into_iter().map(|(_, path)| path).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name_is_md5_hex() {
        assert_eq!(entry_name(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            entry_name("tidal:track:1234"),
            format!("{:x}", md5::compute(b"tidal:track:1234"))
        );
        assert_eq!(entry_name("x").len(), 32);
    }

    #[test]
    fn test_sentinel_path() {
        let path = Path::new("/cache/d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            sentinel_for(path),
            Path::new("/cache/d41d8cd98f00b204e9800998ecf8427e.dirty")
        );
        assert_eq!(sentinel_for(path).with_extension(""), path);
    }

    #[tokio::test]
    async fn test_recover_removes_sentinel_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let done = dir.path().join(entry_name("done"));
        let partial = dir.path().join(entry_name("partial"));
        fs::write(&done, b"complete").unwrap();
        fs::write(&partial, b"half").unwrap();
        fs::write(sentinel_for(&partial), b"").unwrap();
        // Sentinel whose data file never got created.
        fs::write(dir.path().join(format!("{}.dirty", entry_name("early"))), b"").unwrap();

        let (recovered, files) = recover(dir.path()).await.unwrap();

        assert_eq!(recovered, 2);
        assert_eq!(files, vec![done]);
        assert!(!partial.exists());
        assert!(!sentinel_for(&partial).exists());
    }
}
