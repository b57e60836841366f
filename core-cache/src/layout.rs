//! # On-Disk Layout
//!
//! Maps logical keys to file paths for the persistent object cache.
//!
//! Keys are colon-separated URIs such as `tidal:album:1234`. Entries are
//! grouped per object type and named by replacing the separator with a dash:
//!
//! ```text
//! <root>/album/tidal-album-1234.cache        current scheme
//! <root>/album/12/tidal:album:1234.cache     legacy scheme
//! ```
//!
//! Keys with fewer than three segments are stored directly under `<root>`.
//! Both mappings are pure; [`CacheLayout::migrate`] is the only step that
//! moves files between them.

use crate::error::{CacheError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of every entry file.
pub const ENTRY_EXTENSION: &str = "cache";

const SEPARATOR: char = ':';
const LEGACY_PREFIX_CHARS: usize = 2;

/// Outcome of a legacy lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    /// No legacy file exists.
    None,
    /// The legacy file was renamed to the current name.
    Moved,
    /// A current file already existed; the legacy copy was deleted.
    Discarded,
}

/// Key to path mapping rooted at a cache directory.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject keys that cannot be mapped onto a single file name.
    pub fn validate_key(key: &str) -> Result<()> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.contains('\0')
            || key.contains("..")
        {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    /// Path under the current naming scheme.
    pub fn current_path(&self, key: &str) -> Result<PathBuf> {
        Self::validate_key(key)?;
        let name = key.replace(SEPARATOR, "-");
        Ok(self
            .type_dir(key)
            .join(format!("{}.{}", name, ENTRY_EXTENSION)))
    }

    /// Path under the legacy naming scheme.
    pub fn legacy_path(&self, key: &str) -> Result<PathBuf> {
        Self::validate_key(key)?;
        let segments: Vec<&str> = key.split(SEPARATOR).collect();
        let id = if segments.len() >= 3 { segments[2] } else { key };
        let prefix: String = id.chars().take(LEGACY_PREFIX_CHARS).collect();
        Ok(self
            .type_dir(key)
            .join(prefix)
            .join(format!("{}.{}", key, ENTRY_EXTENSION)))
    }

    /// Move a legacy entry for `key` to its current name, if one exists.
    ///
    /// When both files exist the current one wins and the legacy copy is
    /// deleted. An emptied legacy directory is removed best-effort.
    pub fn migrate(&self, key: &str) -> Result<Migration> {
        let legacy = self.legacy_path(key)?;
        if !legacy.is_file() {
            return Ok(Migration::None);
        }

        let current = self.current_path(key)?;
        let outcome = if current.is_file() {
            fs::remove_file(&legacy)?;
            Migration::Discarded
        } else {
            fs::rename(&legacy, &current)?;
            Migration::Moved
        };

        if let Some(dir) = legacy.parent() {
            if dir != self.type_dir(key) {
                // Fails harmlessly while other legacy entries remain.
                let _ = fs::remove_dir(dir);
            }
        }

        debug!(key, outcome = ?outcome, "Migrated legacy cache entry");
        Ok(outcome)
    }

    fn type_dir(&self, key: &str) -> PathBuf {
        let segments: Vec<&str> = key.split(SEPARATOR).collect();
        if segments.len() >= 3 && !segments[1].is_empty() {
            self.root.join(segments[1])
        } else {
            self.root.clone()
        }
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Write `data` to `path` through a temporary sibling and a rename, so the
/// final name never holds a partial payload.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = append_suffix(path, ".tmp");
    if let Err(e) = fs::write(&tmp, data).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
