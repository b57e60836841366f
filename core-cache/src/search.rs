//! Memoization of remote search results.
//!
//! A thin policy layer over a memory-only [`PersistentCache`]: queries are
//! normalized into a stable [`SearchKey`] so equivalent searches share one
//! entry.

use crate::persistent::PersistentCache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

/// Normalized search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchKey {
    /// Exact-match search rather than fuzzy
    pub exact: bool,
    /// Field name to search terms, e.g. `"artist" -> ["Björk"]`
    pub query: BTreeMap<String, Vec<String>>,
}

impl SearchKey {
    pub fn new(exact: bool) -> Self {
        Self {
            exact,
            query: BTreeMap::new(),
        }
    }

    /// Add terms for a field. Terms are trimmed; empty terms are dropped.
    pub fn with_terms<I, S>(mut self, field: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if !terms.is_empty() {
            self.query.entry(field.into()).or_default().extend(terms);
        }
        self
    }

    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update([u8::from(self.exact)]);
        for (field, terms) in &self.query {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
            for term in terms {
                hasher.update(term.as_bytes());
                hasher.update([0u8]);
            }
            hasher.update([0xffu8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.exact { "exact" } else { "fuzzy" };
        write!(f, "search:{}:{}", kind, self.digest())
    }
}

/// Cache of search results keyed by [`SearchKey`].
pub struct SearchCache<V> {
    inner: PersistentCache<V>,
}

impl<V> SearchCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Cache holding at most `max_items` results (0 = unbounded).
    pub fn new(max_items: usize) -> Self {
        Self {
            inner: PersistentCache::in_memory(max_items),
        }
    }

    pub fn get(&self, key: &SearchKey) -> Option<V> {
        self.inner.get(&key.to_string())
    }

    /// Return the cached result or compute and store it.
    pub fn get_or_insert_with<F>(&self, key: &SearchKey, search: F) -> V
    where
        F: FnOnce() -> V,
    {
        let key = key.to_string();
        if let Some(hit) = self.inner.get(&key) {
            return hit;
        }
        let value = search();
        // Memory-only writes cannot fail.
        let _ = self.inner.write(key, value.clone());
        value
    }

    /// Async variant for fallible remote searches; errors are not cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &SearchKey, search: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let key = key.to_string();
        if let Some(hit) = self.inner.get(&key) {
            return Ok(hit);
        }
        let value = search().await?;
        let _ = self.inner.write(key, value.clone());
        Ok(value)
    }

    pub fn invalidate(&self, key: &SearchKey) {
        self.inner.evict(&key.to_string());
    }

    pub fn clear(&self) {
        let _ = self.inner.prune_all();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_equivalent_queries_share_a_key() {
        let a = SearchKey::new(false).with_terms("artist", [" Björk "]);
        let b = SearchKey::new(false).with_terms("artist", ["Björk", ""]);
        assert_eq!(a.to_string(), b.to_string());
        assert!(a.to_string().starts_with("search:fuzzy:"));
    }

    #[test]
    fn test_exactness_changes_key() {
        let fuzzy = SearchKey::new(false).with_terms("any", ["hi"]);
        let exact = SearchKey::new(true).with_terms("any", ["hi"]);
        assert_ne!(fuzzy.to_string(), exact.to_string());
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        let a = SearchKey::new(false).with_terms("ab", ["c"]);
        let b = SearchKey::new(false).with_terms("a", ["bc"]);
        assert_ne!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_result_is_memoized() {
        let cache: SearchCache<Vec<String>> = SearchCache::new(4);
        let key = SearchKey::new(false).with_terms("track", ["Roads"]);
        let calls = Cell::new(0);

        let search = || {
            calls.set(calls.get() + 1);
            vec!["tidal:track:1".to_string()]
        };
        let first = cache.get_or_insert_with(&key, search);
        let second = cache.get_or_insert_with(&key, || {
            calls.set(calls.get() + 1);
            Vec::new()
        });

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_search_is_not_cached() {
        let cache: SearchCache<u32> = SearchCache::new(0);
        let key = SearchKey::new(true).with_terms("album", ["Dummy"]);

        let failed: Result<u32, &str> = cache
            .get_or_try_insert_with(&key, || async { Err("offline") })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty());

        let ok: Result<u32, &str> = cache
            .get_or_try_insert_with(&key, || async { Ok(7) })
            .await;
        assert_eq!(ok, Ok(7));
        assert_eq!(cache.get(&key), Some(7));

        cache.invalidate(&key);
        assert_eq!(cache.get(&key), None);
    }
}
