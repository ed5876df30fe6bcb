//! Result cache with LRU eviction and per-kind TTLs.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Cache configuration, including the per-kind TTL table. `TTL = 0` means
/// "do not cache this kind".
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub max_size: usize,
    pub enabled: bool,
    pub per_kind_ttl: BTreeMap<String, Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let per_kind_ttl = BTreeMap::from([
            ("ApiCall".to_string(), Duration::from_secs(300)),
            ("FilterData".to_string(), Duration::from_secs(60)),
            ("TransformData".to_string(), Duration::from_secs(60)),
            ("MergeData".to_string(), Duration::from_secs(60)),
            // Side effects and control flow are never cached.
            ("StoreData".to_string(), Duration::ZERO),
            ("Wait".to_string(), Duration::ZERO),
            ("Loop".to_string(), Duration::ZERO),
            ("Conditional".to_string(), Duration::ZERO),
            // Utility kinds read the data model, so a config-keyed
            // fingerprint cannot distinguish their inputs across
            // executions; the shared cache must not serve them.
            ("GetCurrentDateTime".to_string(), Duration::ZERO),
            ("ConvertTimezone".to_string(), Duration::ZERO),
            ("DateCalculation".to_string(), Duration::ZERO),
            ("FormatText".to_string(), Duration::ZERO),
            ("ExtractText".to_string(), Duration::ZERO),
            ("ValidateData".to_string(), Duration::ZERO),
            ("Calculate".to_string(), Duration::ZERO),
            ("EncodeDecode".to_string(), Duration::ZERO),
        ]);
        Self {
            default_ttl: Duration::from_secs(300),
            max_size: 1_000,
            enabled: true,
            per_kind_ttl,
        }
    }
}

impl CacheConfig {
    /// Effective TTL for an operation kind.
    pub fn ttl_for(&self, kind: &str) -> Duration {
        self.per_kind_ttl
            .get(kind)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

/// Hit/miss/set/evict counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub size: usize,
    pub hit_rate: f64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    kind: String,
    value: Value,
    created_at: Instant,
    ttl: Duration,
    access_count: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        !self.ttl.is_zero() && now.duration_since(self.created_at) > self.ttl
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    sets: u64,
    evictions: u64,
}

/// The operation result cache.
///
/// Entries are kept in insertion order; a hit promotes its entry to the
/// back, so the front is always the least recently used. Get-then-promote
/// and set-with-eviction each run under the one lock.
pub struct ResultCache {
    config: CacheConfig,
    entries: Mutex<IndexMap<String, CacheEntry>>,
    counters: Mutex<Counters>,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(IndexMap::new()),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Fingerprint of an operation: SHA-256 over the canonical JSON of
    /// `{kind, config}`. Structurally equal configs collide by design;
    /// any difference separates them.
    pub fn fingerprint(kind: &str, config: &Value) -> String {
        // serde_json maps are sorted by key, so `to_string` is canonical.
        let canonical = serde_json::json!({ "config": config, "kind": kind }).to_string();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    /// Look up a cached result for an operation.
    pub fn get(&self, kind: &str, config: &Value) -> Option<Value> {
        if !self.config.enabled || self.config.ttl_for(kind).is_zero() {
            return None;
        }

        let key = Self::fingerprint(kind, config);
        let now = Instant::now();

        let mut entries = self.entries.lock();
        Self::trim_expired(&mut entries, now);

        let Some(mut entry) = entries.shift_remove(&key) else {
            self.counters.lock().misses += 1;
            return None;
        };

        entry.access_count += 1;
        let value = entry.value.clone();
        // Re-insert at the back: most recently used.
        entries.insert(key, entry);
        self.counters.lock().hits += 1;
        debug!(kind, "cache hit");
        Some(value)
    }

    /// Store an operation result.
    pub fn set(&self, kind: &str, config: &Value, value: Value) {
        if !self.config.enabled {
            return;
        }
        let ttl = self.config.ttl_for(kind);
        if ttl.is_zero() {
            return;
        }

        let key = Self::fingerprint(kind, config);
        let now = Instant::now();

        let mut entries = self.entries.lock();
        Self::trim_expired(&mut entries, now);

        if entries.len() >= self.config.max_size && !entries.contains_key(&key) {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                self.counters.lock().evictions += 1;
                debug!(key = %evicted, "cache eviction");
            }
        }

        entries.insert(
            key,
            CacheEntry {
                kind: kind.to_string(),
                value,
                created_at: now,
                ttl,
                access_count: 0,
            },
        );
        self.counters.lock().sets += 1;
    }

    /// Drop every entry of one operation kind.
    pub fn invalidate_kind(&self, kind: &str) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.kind != kind);
        info!(kind, invalidated = before - entries.len(), "invalidated cache entries");
    }

    /// Drop every entry whose key or kind contains the pattern.
    pub fn invalidate_matching(&self, pattern: &str) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, entry| !key.contains(pattern) && !entry.kind.contains(pattern));
        info!(pattern, invalidated = before - entries.len(), "invalidated cache entries");
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.lock().clear();
        info!("cache cleared");
    }

    /// Counters plus current size; expired entries are trimmed first.
    pub fn stats(&self) -> CacheStats {
        let mut entries = self.entries.lock();
        Self::trim_expired(&mut entries, Instant::now());
        let size = entries.len();
        drop(entries);

        let counters = self.counters.lock();
        let lookups = counters.hits + counters.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            counters.hits as f64 / lookups as f64 * 100.0
        };
        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            sets: counters.sets,
            evictions: counters.evictions,
            size,
            hit_rate,
        }
    }

    fn trim_expired(entries: &mut IndexMap<String, CacheEntry>, now: Instant) {
        entries.retain(|_, entry| !entry.is_expired(now));
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("size", &self.entries.lock().len())
            .field("max_size", &self.config.max_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn small_cache(max_size: usize) -> ResultCache {
        ResultCache::new(CacheConfig {
            max_size,
            ..CacheConfig::default()
        })
    }

    #[test]
    fn fingerprint_is_deterministic_and_config_sensitive() {
        let a = ResultCache::fingerprint("ApiCall", &json!({"url": "https://x", "method": "GET"}));
        let b = ResultCache::fingerprint("ApiCall", &json!({"method": "GET", "url": "https://x"}));
        let c = ResultCache::fingerprint("ApiCall", &json!({"method": "GET", "url": "https://y"}));
        let d = ResultCache::fingerprint("FilterData", &json!({"method": "GET", "url": "https://x"}));

        // Key order does not matter; any value or kind difference does.
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn get_set_roundtrip_counts_hits_and_misses() {
        let cache = small_cache(10);
        let config = json!({"url": "https://api.example.com/users"});

        assert_eq!(cache.get("ApiCall", &config), None);
        cache.set("ApiCall", &config, json!([1, 2, 3]));
        assert_eq!(cache.get("ApiCall", &config), Some(json!([1, 2, 3])));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn zero_ttl_kinds_are_never_cached() {
        let cache = small_cache(10);
        let config = json!({"storage": "db", "key": "k", "inputPath": "/x"});
        cache.set("StoreData", &config, json!(true));
        assert_eq!(cache.get("StoreData", &config), None);
        assert_eq!(cache.stats().sets, 0);
    }

    #[test]
    fn lru_eviction_drops_least_recently_used() {
        let cache = small_cache(2);
        cache.set("ApiCall", &json!({"url": "a"}), json!("a"));
        cache.set("ApiCall", &json!({"url": "b"}), json!("b"));
        // Touch `a` so `b` becomes the LRU entry.
        cache.get("ApiCall", &json!({"url": "a"}));
        cache.set("ApiCall", &json!({"url": "c"}), json!("c"));

        assert_eq!(cache.get("ApiCall", &json!({"url": "a"})), Some(json!("a")));
        assert_eq!(cache.get("ApiCall", &json!({"url": "b"})), None);
        assert_eq!(cache.get("ApiCall", &json!({"url": "c"})), Some(json!("c")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn expired_entries_are_trimmed_before_lookup() {
        let cache = ResultCache::new(CacheConfig {
            per_kind_ttl: BTreeMap::from([("ApiCall".to_string(), Duration::from_millis(10))]),
            ..CacheConfig::default()
        });
        let config = json!({"url": "a"});
        cache.set("ApiCall", &config, json!(1));
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(cache.get("ApiCall", &config), None);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn invalidation_by_kind_pattern_and_full_flush() {
        let cache = small_cache(10);
        cache.set("ApiCall", &json!({"url": "a"}), json!(1));
        cache.set("FilterData", &json!({"inputPath": "/x"}), json!(2));

        cache.invalidate_kind("ApiCall");
        assert_eq!(cache.get("ApiCall", &json!({"url": "a"})), None);
        assert_eq!(cache.get("FilterData", &json!({"inputPath": "/x"})), Some(json!(2)));

        cache.invalidate_matching("Filter");
        assert_eq!(cache.get("FilterData", &json!({"inputPath": "/x"})), None);

        cache.set("ApiCall", &json!({"url": "a"}), json!(1));
        cache.clear();
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let cache = ResultCache::new(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });
        let config = json!({"url": "a"});
        cache.set("ApiCall", &config, json!(1));
        assert_eq!(cache.get("ApiCall", &config), None);
    }
}
