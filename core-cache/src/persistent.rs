//! # Persistent Object Cache
//!
//! Key/value cache with a bounded in-memory tier and a write-through disk tier.
//!
//! ## Overview
//!
//! - Reads hit memory first; on a miss the disk tier is consulted (migrating
//!   legacy file names on the way) and the value is promoted into memory.
//! - Writes always go through to disk when persistence is enabled, then land
//!   in memory. If memory holds more than `max_items_ram` entries the
//!   least-recently written entry is dropped from memory only.
//! - Corrupt or unreadable disk entries are treated as misses; corrupt files
//!   are deleted.
//!
//! `keys`, `len` and `contains_key` describe the in-memory tier only.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use core_cache::{PersistentCache, PersistentCacheConfig};
//!
//! # fn main() -> core_cache::Result<()> {
//! let config = PersistentCacheConfig::new().with_max_items_ram(8);
//! let cache: PersistentCache<Option<String>> = PersistentCache::open("/tmp/tidal", config)?;
//!
//! cache.write("tidal:artist:1", Some("Portishead".to_string()))?;
//! assert_eq!(cache.get("tidal:artist:1"), Some(Some("Portishead".to_string())));
//! # Ok(())
//! # }
//! ```

use crate::codec::{Codec, JsonCodec};
use crate::error::{CacheError, Result};
use crate::heap::RecencyHeap;
use crate::layout::{remove_if_exists, write_atomic, CacheLayout};
use core_runtime::config::ObjectCacheSettings;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration for a [`PersistentCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentCacheConfig {
    /// Maximum entries kept in memory; 0 means unbounded
    pub max_items_ram: usize,

    /// Whether entries are written through to disk
    pub persist: bool,

    /// Subdirectory of the base cache directory holding entry files
    pub directory: String,

    /// Whether memory hits refresh recency.
    ///
    /// Off by default: only writes and disk promotions count as a touch, so
    /// eviction order is insertion order. Enabling it gives true LRU.
    pub refresh_on_read: bool,
}

impl Default for PersistentCacheConfig {
    fn default() -> Self {
        Self {
            max_items_ram: 0,
            persist: true,
            directory: "cache".to_string(),
            refresh_on_read: false,
        }
    }
}

impl PersistentCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_items_ram(mut self, max_items_ram: usize) -> Self {
        self.max_items_ram = max_items_ram;
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_refresh_on_read(mut self, refresh: bool) -> Self {
        self.refresh_on_read = refresh;
        self
    }
}

impl From<&ObjectCacheSettings> for PersistentCacheConfig {
    fn from(settings: &ObjectCacheSettings) -> Self {
        Self {
            max_items_ram: settings.max_items_ram,
            persist: settings.persist,
            directory: settings.directory.clone(),
            refresh_on_read: settings.refresh_on_read,
        }
    }
}

struct MemoryTier<V> {
    values: HashMap<String, V>,
    recency: RecencyHeap<String>,
}

/// Two-tier key/value cache.
pub struct PersistentCache<V, C = JsonCodec<V>> {
    config: PersistentCacheConfig,
    layout: Option<CacheLayout>,
    codec: C,
    state: Mutex<MemoryTier<V>>,
}

impl<V> PersistentCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Open a JSON-backed cache under `base_dir/<config.directory>`.
    ///
    /// The directory is created when persistence is enabled.
    pub fn open(base_dir: impl AsRef<Path>, config: PersistentCacheConfig) -> Result<Self> {
        Self::with_codec(base_dir, config, JsonCodec::new())
    }

    /// A memory-only cache holding at most `max_items_ram` entries.
    pub fn in_memory(max_items_ram: usize) -> Self {
        Self {
            config: PersistentCacheConfig::new()
                .with_max_items_ram(max_items_ram)
                .with_persist(false),
            layout: None,
            codec: JsonCodec::new(),
            state: Mutex::new(MemoryTier {
                values: HashMap::new(),
                recency: RecencyHeap::new(),
            }),
        }
    }
}

impl<V, C> PersistentCache<V, C>
where
    V: Clone,
    C: Codec<V>,
{
    /// Open a cache with a caller-supplied codec.
    pub fn with_codec(
        base_dir: impl AsRef<Path>,
        config: PersistentCacheConfig,
        codec: C,
    ) -> Result<Self> {
        let layout = if config.persist {
            let root = base_dir.as_ref().join(&config.directory);
            fs::create_dir_all(&root)?;
            info!(
                path = ?root,
                max_items_ram = config.max_items_ram,
                "Opened persistent cache"
            );
            Some(CacheLayout::new(root))
        } else {
            None
        };

        Ok(Self {
            config,
            layout,
            codec,
            state: Mutex::new(MemoryTier {
                values: HashMap::new(),
                recency: RecencyHeap::new(),
            }),
        })
    }

    pub fn max_items_ram(&self) -> usize {
        self.config.max_items_ram
    }

    pub fn persist(&self) -> bool {
        self.config.persist
    }

    /// Directory holding entry files, if persistence is enabled.
    pub fn directory(&self) -> Option<&Path> {
        self.layout.as_ref().map(|layout| layout.root())
    }

    /// Current on-disk location for `key`, if persistence is enabled.
    pub fn cache_file(&self, key: &str) -> Option<PathBuf> {
        self.layout
            .as_ref()
            .and_then(|layout| layout.current_path(key).ok())
    }

    /// Look up `key`, falling back to the disk tier on a memory miss.
    ///
    /// Fails with [`CacheError::NotFound`] if neither tier has a usable entry.
    pub fn read(&self, key: &str) -> Result<V> {
        let mut guard = self.state.lock();
        let tier = &mut *guard;

        if let Some(value) = tier.values.get(key) {
            let value = value.clone();
            if self.config.refresh_on_read && self.is_bounded() {
                let _ = tier.recency.move_to_top(key);
            }
            return Ok(value);
        }

        let Some(layout) = self.layout.as_ref() else {
            return Err(CacheError::NotFound(key.to_string()));
        };

        let value = self
            .load(layout, key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        self.remember(tier, key.to_string(), value.clone());
        Ok(value)
    }

    /// Like [`read`](Self::read) but returns `None` on a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        self.read(key).ok()
    }

    /// Like [`read`](Self::read) but returns `default` on a miss.
    pub fn get_or(&self, key: &str, default: V) -> V {
        self.read(key).unwrap_or(default)
    }

    /// Insert or overwrite `key`.
    ///
    /// Disk errors propagate; the memory tier is only updated once the disk
    /// write succeeded.
    pub fn write(&self, key: impl Into<String>, value: V) -> Result<()> {
        let key = key.into();
        let mut guard = self.state.lock();

        if let Some(layout) = self.layout.as_ref() {
            let path = layout.current_path(&key)?;
            let bytes = self.codec.encode(&value)?;
            write_atomic(&path, &bytes)?;
            debug!(key = %key, size = bytes.len(), "Wrote cache entry");
        }

        self.remember(&mut guard, key, value);
        Ok(())
    }

    /// Write every pair in iteration order.
    pub fn update<I, K>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
    {
        for (key, value) in entries {
            self.write(key, value)?;
        }
        Ok(())
    }

    /// Drop `key` from memory and delete its files. Absent keys are ignored.
    pub fn prune(&self, key: &str) -> Result<()> {
        {
            let mut guard = self.state.lock();
            let tier = &mut *guard;
            tier.values.remove(key);
            let _ = tier.recency.remove(key);

            if let Some(layout) = self.layout.as_ref() {
                if CacheLayout::validate_key(key).is_ok() {
                    remove_if_exists(&layout.current_path(key)?)?;
                    remove_if_exists(&layout.legacy_path(key)?)?;
                }
            }
        }

        debug!(key, "Pruned cache entry");
        Ok(())
    }

    /// Clear memory and delete everything in the cache directory.
    pub fn prune_all(&self) -> Result<()> {
        let mut guard = self.state.lock();
        guard.values.clear();
        guard.recency.clear();

        if let Some(layout) = self.layout.as_ref() {
            clear_directory(layout.root())?;
            info!(path = ?layout.root(), "Pruned all cache entries");
        }
        Ok(())
    }

    /// Drop `key` from memory only, keeping any disk copy.
    pub fn evict(&self, key: &str) -> Option<V> {
        let mut guard = self.state.lock();
        let tier = &mut *guard;
        let _ = tier.recency.remove(key);
        tier.values.remove(key)
    }

    /// Keys currently held in memory.
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().values.keys().cloned().collect()
    }

    /// Whether `key` is held in memory.
    pub fn contains_key(&self, key: &str) -> bool {
        self.state.lock().values.contains_key(key)
    }

    /// Number of entries held in memory.
    pub fn len(&self) -> usize {
        self.state.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the in-memory tier.
    pub fn snapshot(&self) -> HashMap<String, V> {
        self.state.lock().values.clone()
    }

    fn is_bounded(&self) -> bool {
        self.config.max_items_ram > 0
    }

    fn load(&self, layout: &CacheLayout, key: &str) -> Option<V> {
        if let Err(e) = layout.migrate(key) {
            if matches!(e, CacheError::InvalidKey(_)) {
                return None;
            }
            warn!(key, error = %e, "Failed to migrate legacy cache entry");
        }

        let path = layout.current_path(key).ok()?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key, error = %e, "Unreadable cache entry");
                return None;
            }
        };

        match self.codec.decode(&bytes) {
            Ok(value) => {
                debug!(key, "Loaded cache entry from disk");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Discarding corrupt cache entry");
                if let Err(e) = remove_if_exists(&path) {
                    warn!(key, error = %e, "Failed to delete corrupt cache entry");
                }
                None
            }
        }
    }

    fn remember(&self, tier: &mut MemoryTier<V>, key: String, value: V) {
        if self.is_bounded() {
            if tier.recency.contains(key.as_str()) {
                let _ = tier.recency.move_to_top(key.as_str());
            } else {
                let _ = tier.recency.push(key.clone());
            }
        }
        tier.values.insert(key, value);

        if !self.is_bounded() {
            return;
        }
        while tier.values.len() > self.config.max_items_ram {
            match tier.recency.pop() {
                Ok(victim) => {
                    tier.values.remove(&victim);
                    debug!(key = %victim, "Evicted cache entry from memory");
                }
                Err(_) => break,
            }
        }
    }
}

fn clear_directory(root: &Path) -> io::Result<()> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_builder() {
        let config = PersistentCacheConfig::new()
            .with_max_items_ram(1678)
            .with_persist(false)
            .with_directory("objects")
            .with_refresh_on_read(true);

        assert_eq!(config.max_items_ram, 1678);
        assert!(!config.persist);
        assert_eq!(config.directory, "objects");
        assert!(config.refresh_on_read);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = ObjectCacheSettings {
            max_items_ram: 12,
            persist: false,
            directory: "objects".to_string(),
            refresh_on_read: true,
        };
        let config = PersistentCacheConfig::from(&settings);
        assert_eq!(config.max_items_ram, 12);
        assert!(!config.persist);
        assert_eq!(config.directory, "objects");
        assert!(config.refresh_on_read);
    }

    #[test]
    fn test_in_memory_cache_never_touches_disk() {
        let cache: PersistentCache<u32> = PersistentCache::in_memory(2);
        cache.write("tidal:track:1", 1).unwrap();
        assert!(cache.directory().is_none());
        assert!(cache.cache_file("tidal:track:1").is_none());
        assert_eq!(cache.read("tidal:track:1").unwrap(), 1);
    }

    #[test]
    fn test_non_persistent_open_creates_nothing() {
        let dir = tempdir().unwrap();
        let config = PersistentCacheConfig::new().with_persist(false);
        let cache: PersistentCache<u32> = PersistentCache::open(dir.path(), config).unwrap();
        cache.write("tidal:track:1", 1).unwrap();
        assert!(!dir.path().join("cache").exists());
    }

    #[test]
    fn test_refresh_on_read_gives_true_lru() {
        let cache: PersistentCache<u32> = PersistentCache::with_codec(
            "/unused",
            PersistentCacheConfig::new()
                .with_max_items_ram(2)
                .with_persist(false)
                .with_refresh_on_read(true),
            JsonCodec::new(),
        )
        .unwrap();

        cache.write("tidal:uri:0", 0).unwrap();
        cache.write("tidal:uri:1", 1).unwrap();
        cache.read("tidal:uri:0").unwrap();
        cache.write("tidal:uri:2", 2).unwrap();

        assert!(cache.contains_key("tidal:uri:0"));
        assert!(!cache.contains_key("tidal:uri:1"));
    }

    #[test]
    fn test_invalid_key_write_fails_when_persisting() {
        let dir = tempdir().unwrap();
        let cache: PersistentCache<u32> =
            PersistentCache::open(dir.path(), PersistentCacheConfig::new()).unwrap();
        let err = cache.write("../escape", 1).unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey(_)));
        assert!(cache.is_empty());
        assert!(matches!(
            cache.read("../escape"),
            Err(CacheError::NotFound(_))
        ));
    }
}
