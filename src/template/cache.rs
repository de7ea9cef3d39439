//! SHA-256-keyed, strict-LRU cache of parsed templates.
//!
//! Grounded on the `lru` crate's `Mutex<LruCache<K, V>>` idiom (seen in
//! the pack's pattern-cache module), in deliberate contrast to the regex
//! cache's whole-clear eviction and the classification cache's FIFO
//! eviction: this is the one cache in the crate where recency actually
//! predicts reuse, since a handful of notification templates render far
//! more often than the long tail.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use handlebars::Handlebars;
use lru::LruCache;
use sha2::{Digest, Sha256};

use crate::error::{Result, SentinelError};

#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

impl TemplateCacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Compute the cache key for a template source: hex-encoded SHA-256.
pub fn cache_key(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Strict LRU of registered-template names, backed by a shared
/// `handlebars::Handlebars` registry that actually owns the parsed
/// templates. Rendering only needs a shared read lock on the registry;
/// registering or evicting a template takes the write lock.
pub struct TemplateCache {
    order: Mutex<LruCache<String, ()>>,
    hits: AtomicU64,
    misses: AtomicU64,
    capacity: usize,
}

impl TemplateCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: Mutex::new(LruCache::new(NonZeroUsize::new(capacity).expect("capacity >= 1"))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            capacity,
        }
    }

    /// Ensure `source` is registered under its SHA-256 key in `registry`,
    /// parsing it at most once across the cache's lifetime, and return
    /// that key. Evicts the least-recently-used entry from `registry`
    /// when the insert would exceed capacity.
    pub fn get_or_compile(&self, registry: &std::sync::RwLock<Handlebars<'static>>, source: &str) -> Result<String> {
        let key = cache_key(source);

        {
            let mut order = self.order.lock().unwrap_or_else(|p| p.into_inner());
            if order.get(&key).is_some() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(key);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let mut registry = registry.write().unwrap_or_else(|p| p.into_inner());
        registry
            .register_template_string(&key, source)
            .map_err(|e| SentinelError::template_parse(source, e.to_string()))?;

        let mut order = self.order.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((evicted_key, _)) = order.push(key.clone(), ()) {
            if evicted_key != key {
                registry.unregister_template(&evicted_key);
            }
        }

        Ok(key)
    }

    pub fn invalidate(&self, registry: &std::sync::RwLock<Handlebars<'static>>) {
        let mut order = self.order.lock().unwrap_or_else(|p| p.into_inner());
        let mut registry = registry.write().unwrap_or_else(|p| p.into_inner());
        for key in order.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>() {
            registry.unregister_template(&key);
        }
        order.clear();
    }

    pub fn stats(&self) -> TemplateCacheStats {
        let size = self.order.lock().unwrap_or_else(|p| p.into_inner()).len();
        TemplateCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size,
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::RwLock;

    #[test]
    fn same_source_reuses_the_registered_template() {
        let registry = RwLock::new(Handlebars::new());
        let cache = TemplateCache::new(10);
        let key1 = cache.get_or_compile(&registry, "{{foo}}").unwrap();
        let key2 = cache.get_or_compile(&registry, "{{foo}}").unwrap();
        assert_eq!(key1, key2);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn eviction_unregisters_from_the_handlebars_registry() {
        let registry = RwLock::new(Handlebars::new());
        let cache = TemplateCache::new(1);
        let first_key = cache.get_or_compile(&registry, "{{a}}").unwrap();
        cache.get_or_compile(&registry, "{{b}}").unwrap();
        assert_eq!(cache.stats().size, 1);
        assert!(!registry.read().unwrap().has_template(&first_key));
    }

    #[test]
    fn invalid_template_source_is_not_cached() {
        let registry = RwLock::new(Handlebars::new());
        let cache = TemplateCache::new(10);
        let err = cache.get_or_compile(&registry, "{{#if}}unterminated");
        assert!(err.is_err());
        assert_eq!(cache.stats().size, 0);
    }
}
