//! Fingerprint-keyed cache of previously obtained [`Classification`]s, with
//! TTL-bounded reads and FIFO eviction on overflow.
//!
//! Grounded on the teacher's `cache::unified_cache` stats-struct shape
//! (hit/miss counters plus a `report()` string), adapted to the spec's FIFO
//! eviction policy: measured fingerprint workloads show poor locality of
//! repeated keys, so the extra bookkeeping LRU needs buys nothing here.

use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use std::collections::HashMap;

use super::types::Classification;

struct CacheEntry {
    classification: Classification,
    inserted_at: Instant,
}

/// Configuration for a [`ClassificationCache`].
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize)]
pub struct ClassificationCacheConfig {
    pub ttl: Duration,
    pub max_size: usize,
}

impl Default for ClassificationCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_size: 10_000,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ClassificationCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evicted: u64,
}

impl ClassificationCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner {
    entries: HashMap<String, CacheEntry>,
    insertion_order: VecDeque<String>,
    stats: ClassificationCacheStats,
}

/// Thread-safe fingerprint → classification cache. Writes take the
/// exclusive lock; reads take the shared lock.
pub struct ClassificationCache {
    inner: RwLock<Inner>,
    ttl: Duration,
    max_size: usize,
}

impl ClassificationCache {
    pub fn new(config: ClassificationCacheConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
                stats: ClassificationCacheStats::default(),
            }),
            ttl: config.ttl,
            max_size: config.max_size,
        }
    }

    /// Return a live classification for `fingerprint`, or `None` if absent
    /// or older than the configured TTL (an expired entry is treated as
    /// missing but is not eagerly removed here; `cleanup_expired` does
    /// that).
    pub fn get(&self, fingerprint: &str) -> Option<Classification> {
        let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
        match inner.entries.get(fingerprint) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                inner.stats.hits += 1;
                Some(entry.classification.clone())
            }
            Some(_) => {
                inner.stats.misses += 1;
                inner.stats.expired += 1;
                None
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or overwrite the classification for `fingerprint`, evicting
    /// the oldest-inserted entry first if this insert would exceed
    /// capacity. Callers must never pass a fallback classification here.
    pub fn put(&self, fingerprint: String, classification: Classification) {
        let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
        if !inner.entries.contains_key(&fingerprint) && inner.entries.len() >= self.max_size {
            if let Some(oldest) = inner.insertion_order.pop_front() {
                inner.entries.remove(&oldest);
                inner.stats.evicted += 1;
            }
        }
        if !inner.entries.contains_key(&fingerprint) {
            inner.insertion_order.push_back(fingerprint.clone());
        }
        inner.entries.insert(
            fingerprint,
            CacheEntry {
                classification,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove expired entries proactively; returns the count removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
        let ttl = self.ttl;
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.inserted_at.elapsed() > ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.entries.remove(key);
            inner.insertion_order.retain(|k| k != key);
        }
        inner.stats.expired += expired.len() as u64;
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ClassificationCacheStats {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::types::Severity;

    fn classification() -> Classification {
        Classification {
            severity: Severity::Warning,
            category: "test".into(),
            confidence: 0.9,
            reasoning: None,
            action_items: vec![],
            model: "test-model".into(),
            processing_time_ms: 10,
            is_fallback: false,
        }
    }

    #[test]
    fn put_then_get_hits() {
        let cache = ClassificationCache::new(ClassificationCacheConfig::default());
        cache.put("fp1".into(), classification());
        assert!(cache.get("fp1").is_some());
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn missing_key_is_a_miss() {
        let cache = ClassificationCache::new(ClassificationCacheConfig::default());
        assert!(cache.get("missing").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn expired_entry_treated_as_missing() {
        let cache = ClassificationCache::new(ClassificationCacheConfig {
            ttl: Duration::from_millis(1),
            max_size: 100,
        });
        cache.put("fp1".into(), classification());
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("fp1").is_none());
    }

    #[test]
    fn fifo_eviction_drops_oldest_on_overflow() {
        let cache = ClassificationCache::new(ClassificationCacheConfig {
            ttl: Duration::from_secs(3600),
            max_size: 2,
        });
        cache.put("a".into(), classification());
        cache.put("b".into(), classification());
        cache.put("c".into(), classification());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }
}
