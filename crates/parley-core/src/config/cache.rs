//! Bounded least-recently-used cache of resolved configuration records.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A resolved configuration object. Never mutated once cached.
pub type ConfigRecord = Map<String, Value>;

/// Identifies one resolution: extension, optional bot, and whether the global
/// tiers were skipped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    /// Lowercased extension name.
    pub extension: String,
    /// Bot the configuration is resolved for, if any.
    pub bot_id: Option<String>,
    /// Skip the global file and environment tiers.
    pub ignore_global: bool,
}

impl ConfigKey {
    /// Create a new key. The extension name is lowercased.
    pub fn new(extension: &str, bot_id: Option<&str>, ignore_global: bool) -> Self {
        Self {
            extension: extension.to_lowercase(),
            bot_id: bot_id.map(str::to_string),
            ignore_global,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}//{}//{}",
            self.extension,
            self.bot_id.as_deref().unwrap_or_default(),
            self.ignore_global
        )
    }
}

/// Cache statistics for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that required a computation.
    pub misses: u64,
    /// Entries dropped because of capacity or invalidation.
    pub evictions: u64,
    /// Current number of entries.
    pub size: usize,
}

#[derive(Debug)]
struct CacheEntry {
    record: Arc<ConfigRecord>,
    last_used: u64,
}

/// LRU map from [`ConfigKey`] to shared records.
///
/// Each extension carries a generation counter bumped on invalidation, so a
/// record computed before an invalidation can be refused at insertion time.
#[derive(Debug)]
pub struct ConfigCache {
    entries: HashMap<ConfigKey, CacheEntry>,
    generations: HashMap<String, u64>,
    capacity: usize,
    clock: u64,
    stats: CacheStats,
}

impl ConfigCache {
    /// Create a cache holding at most `capacity` records (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            generations: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    /// Looks up a record, marking it as most recently used.
    pub fn get(&mut self, key: &ConfigKey) -> Option<Arc<ConfigRecord>> {
        self.clock += 1;
        let clock = self.clock;
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = clock;
                self.stats.hits += 1;
                Some(Arc::clone(&entry.record))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Current generation of an extension. Pass it back to [`Self::insert`].
    pub fn generation(&self, extension: &str) -> u64 {
        self.generations.get(extension).copied().unwrap_or_default()
    }

    /// Stores a record computed while `generation` was current.
    ///
    /// # Returns
    /// `false` when the extension was invalidated since, in which case the
    /// record is not stored.
    pub fn insert(&mut self, key: ConfigKey, record: Arc<ConfigRecord>, generation: u64) -> bool {
        if self.generation(&key.extension) != generation {
            debug!(key = %key, "Discarding configuration computed before invalidation");
            return false;
        }

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(lru_key) = self.find_lru_key() {
                self.entries.remove(&lru_key);
                self.stats.evictions += 1;
                debug!(key = %lru_key, "Evicted least recently used configuration");
            }
        }

        self.clock += 1;
        self.entries.insert(key, CacheEntry { record, last_used: self.clock });
        self.stats.size = self.entries.len();
        true
    }

    /// Evicts every entry of `extension` and bumps its generation.
    ///
    /// # Returns
    /// The number of evicted entries.
    pub fn invalidate_extension(&mut self, extension: &str) -> usize {
        *self.generations.entry(extension.to_string()).or_default() += 1;

        let before = self.entries.len();
        self.entries.retain(|key, _| key.extension != extension);
        let evicted = before - self.entries.len();

        self.stats.evictions += evicted as u64;
        self.stats.size = self.entries.len();
        evicted
    }

    /// Drops every entry and bumps every known generation.
    pub fn clear(&mut self) -> usize {
        let extensions: Vec<String> = self
            .entries
            .keys()
            .map(|key| key.extension.clone())
            .chain(self.generations.keys().cloned())
            .collect();
        for extension in extensions {
            *self.generations.entry(extension).or_default() += 1;
        }

        let cleared = self.entries.len();
        self.entries.clear();
        self.stats.evictions += cleared as u64;
        self.stats.size = 0;
        cleared
    }

    /// Snapshot of the statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats { size: self.entries.len(), ..self.stats.clone() }
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no record.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a record is cached for `key`, without touching recency.
    pub fn contains(&self, key: &ConfigKey) -> bool {
        self.entries.contains_key(key)
    }

    fn find_lru_key(&self) -> Option<ConfigKey> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: i64) -> Arc<ConfigRecord> {
        let mut map = Map::new();
        map.insert("value".to_string(), json!(value));
        Arc::new(map)
    }

    #[test]
    fn test_key_display_matches_legacy_format() {
        assert_eq!(ConfigKey::new("Foo", Some("bot1"), false).to_string(), "foo//bot1//false");
        assert_eq!(ConfigKey::new("foo", None, true).to_string(), "foo////true");
    }

    #[test]
    fn test_keys_with_separators_do_not_collide() {
        let a = ConfigKey::new("a//b", None, false);
        let b = ConfigKey::new("a", Some("b//"), false);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hit_returns_same_record() {
        let mut cache = ConfigCache::new(4);
        let key = ConfigKey::new("foo", None, false);
        assert!(cache.get(&key).is_none());

        let stored = record(1);
        assert!(cache.insert(key.clone(), Arc::clone(&stored), cache.generation("foo")));

        let fetched = cache.get(&key).unwrap();
        assert!(Arc::ptr_eq(&stored, &fetched));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_lru_eviction_when_full() {
        let mut cache = ConfigCache::new(2);
        let k1 = ConfigKey::new("one", None, false);
        let k2 = ConfigKey::new("two", None, false);
        let k3 = ConfigKey::new("three", None, false);

        cache.insert(k1.clone(), record(1), 0);
        cache.insert(k2.clone(), record(2), 0);
        // Touch k1 so k2 becomes least recently used
        cache.get(&k1);
        cache.insert(k3.clone(), record(3), 0);

        assert!(cache.contains(&k1));
        assert!(!cache.contains(&k2));
        assert!(cache.contains(&k3));
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate_extension_only_touches_that_extension() {
        let mut cache = ConfigCache::new(10);
        cache.insert(ConfigKey::new("foo", None, false), record(1), 0);
        cache.insert(ConfigKey::new("foo", Some("bot1"), false), record(2), 0);
        cache.insert(ConfigKey::new("foobar", None, false), record(3), 0);

        assert_eq!(cache.invalidate_extension("foo"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&ConfigKey::new("foobar", None, false)));
    }

    #[test]
    fn test_stale_insert_is_refused() {
        let mut cache = ConfigCache::new(10);
        let generation = cache.generation("foo");
        cache.invalidate_extension("foo");

        assert!(!cache.insert(ConfigKey::new("foo", None, false), record(1), generation));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut cache = ConfigCache::new(10);
        cache.insert(ConfigKey::new("foo", None, false), record(1), 0);
        cache.insert(ConfigKey::new("bar", None, false), record(2), 0);

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
        assert_ne!(cache.generation("foo"), 0);
    }
}
