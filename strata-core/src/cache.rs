//! LruCache - Recency Cache with Hit/Miss Statistics
//!
//! `TigerStyle`: Explicit capacity states, O(1) operations, counters tracked.
//!
//! # Design
//!
//! Thin wrapper over the `lru` crate. Capacity is normalized from the raw
//! configured value instead of being rejected:
//!
//! ```text
//! configured  0  → Disabled   (nothing stored, every lookup misses)
//! configured  N  → Bounded(N) (least recently used evicted on insert)
//! configured <0  → Unbounded  (never evicts)
//! ```

use std::borrow::Borrow;
use std::hash::Hash;
use std::num::NonZeroUsize;

use serde::Serialize;

// =============================================================================
// Capacity
// =============================================================================

/// Normalized cache capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCapacity {
    /// Caching turned off.
    Disabled,
    /// At most this many entries.
    Bounded(NonZeroUsize),
    /// No eviction.
    Unbounded,
}

impl CacheCapacity {
    /// Normalize a configured capacity.
    ///
    /// Negative values are treated as "no bound" rather than an error.
    #[must_use]
    pub fn from_config(size: i64) -> Self {
        if size < 0 {
            return Self::Unbounded;
        }
        usize::try_from(size)
            .ok()
            .and_then(NonZeroUsize::new)
            .map_or(Self::Disabled, Self::Bounded)
    }

    /// Capacity as a number, `None` when unbounded.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Disabled => Some(0),
            Self::Bounded(n) => Some(n.get()),
            Self::Unbounded => None,
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Entries currently cached
    pub size: usize,
    /// Capacity (`None` = unbounded)
    pub capacity: Option<usize>,
    /// Lookup hits
    pub hits: u64,
    /// Lookup misses
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 with no lookups
    pub hit_rate: f64,
}

// =============================================================================
// LruCache
// =============================================================================

/// Fixed-capacity recency cache.
///
/// `TigerStyle`:
/// - Capacity normalized once at construction
/// - `get` promotes and counts, `peek` does neither
/// - Evictions reported to the caller
#[derive(Debug)]
pub struct LruCache<K: Hash + Eq, V> {
    inner: Option<lru::LruCache<K, V>>,
    capacity: CacheCapacity,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    /// Create a cache with the given capacity.
    #[must_use]
    pub fn new(capacity: CacheCapacity) -> Self {
        let inner = match capacity {
            CacheCapacity::Disabled => None,
            CacheCapacity::Bounded(n) => Some(lru::LruCache::new(n)),
            CacheCapacity::Unbounded => Some(lru::LruCache::unbounded()),
        };
        Self {
            inner,
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    /// Create a cache from a raw configured size.
    #[must_use]
    pub fn from_config(size: i64) -> Self {
        Self::new(CacheCapacity::from_config(size))
    }

    /// Look up an entry, marking it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let found = self.inner.as_mut().and_then(|cache| cache.get(key));
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Look up an entry without touching recency or statistics.
    #[must_use]
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.as_ref().and_then(|cache| cache.peek(key))
    }

    /// Insert or replace an entry.
    ///
    /// Returns the evicted least-recently-used pair, if inserting a new key
    /// pushed the cache over capacity.
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        let cache = self.inner.as_mut()?;
        if cache.contains(&key) {
            cache.put(key, value);
            return None;
        }
        let evicted = cache.push(key, value);

        // Postcondition
        if let Some(limit) = self.capacity.limit() {
            debug_assert!(cache.len() <= limit, "cache exceeded capacity");
        }
        evicted
    }

    /// Remove an entry.
    pub fn delete<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.as_mut().and_then(|cache| cache.pop(key))
    }

    /// Remove all entries. Statistics are kept.
    pub fn clear(&mut self) {
        if let Some(cache) = self.inner.as_mut() {
            cache.clear();
        }
    }

    /// Reset hit/miss counters.
    pub fn reset_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
    }

    /// Fraction of lookups that hit.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, lru::LruCache::len)
    }

    /// Check if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalized capacity.
    #[must_use]
    pub fn capacity(&self) -> CacheCapacity {
        self.capacity
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            capacity: self.capacity.limit(),
            hits: self.hits,
            misses: self.misses,
            hit_rate: self.hit_rate(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(size: i64) -> LruCache<String, u32> {
        LruCache::from_config(size)
    }

    #[test]
    fn test_capacity_normalization() {
        assert_eq!(CacheCapacity::from_config(0), CacheCapacity::Disabled);
        assert_eq!(CacheCapacity::from_config(-1), CacheCapacity::Unbounded);
        assert_eq!(CacheCapacity::from_config(3).limit(), Some(3));
        assert_eq!(CacheCapacity::Unbounded.limit(), None);
    }

    #[test]
    fn test_evicts_least_recently_inserted() {
        let mut c = cache(2);
        c.set("a".into(), 1);
        c.set("b".into(), 2);
        let evicted = c.set("c".into(), 3);

        assert_eq!(evicted, Some(("a".to_string(), 1)));
        assert_eq!(c.get("b"), Some(&2));
        assert_eq!(c.get("c"), Some(&3));
        assert_eq!(c.get("a"), None);
        assert_eq!(c.stats().hits, 2);
        assert_eq!(c.stats().misses, 1);
    }

    #[test]
    fn test_access_resets_recency() {
        let mut c = cache(2);
        c.set("a".into(), 1);
        c.set("b".into(), 2);
        assert!(c.get("a").is_some());

        let evicted = c.set("c".into(), 3);
        assert_eq!(evicted.map(|(k, _)| k), Some("b".to_string()));
        assert!(c.peek("a").is_some());
    }

    #[test]
    fn test_replace_existing_key_does_not_evict() {
        let mut c = cache(2);
        c.set("a".into(), 1);
        c.set("b".into(), 2);
        assert!(c.set("a".into(), 10).is_none());
        assert_eq!(c.len(), 2);
        assert_eq!(c.peek("a"), Some(&10));
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let mut c = cache(0);
        assert!(c.set("a".into(), 1).is_none());
        assert_eq!(c.get("a"), None);
        assert!(c.is_empty());
        assert_eq!(c.hit_rate(), 0.0);
        assert_eq!(c.stats().misses, 1);
    }

    #[test]
    fn test_unbounded_cache_never_evicts() {
        let mut c = cache(-5);
        for i in 0..1000 {
            assert!(c.set(format!("k{i}"), i).is_none());
        }
        assert_eq!(c.len(), 1000);
        assert_eq!(c.stats().capacity, None);
    }

    #[test]
    fn test_delete_and_clear() {
        let mut c = cache(4);
        c.set("a".into(), 1);
        c.set("b".into(), 2);
        assert_eq!(c.delete("a"), Some(1));
        assert_eq!(c.delete("a"), None);
        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn test_hit_rate() {
        let mut c = cache(4);
        c.set("a".into(), 1);
        let _ = c.get("a");
        let _ = c.get("a");
        let _ = c.get("a");
        let _ = c.get("missing");
        assert!((c.hit_rate() - 0.75).abs() < 1e-9);

        c.reset_stats();
        assert_eq!(c.hit_rate(), 0.0);
    }
}
