//! Thread-safe bounded cache of compiled regular expressions.
//!
//! Grounded on the teacher's `cache::regex_cache` module, simplified from
//! its priority-score LRU to the whole-cache-clear eviction policy: silence
//! patterns form a small, stable set, so the extra bookkeeping an LRU needs
//! is not worth paying for. A double-checked read-then-write lock sequence
//! keeps concurrent callers for the same missing pattern from each compiling
//! independently more than twice.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use regex::Regex;

use crate::error::{Result, SentinelError};

/// Configuration for a [`RegexCache`].
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize)]
pub struct RegexCacheConfig {
    pub max_size: usize,
}

impl Default for RegexCacheConfig {
    fn default() -> Self {
        Self { max_size: 500 }
    }
}

/// Thread-safe bounded cache of compiled [`Regex`] objects.
///
/// `Get` compiles on first request for a pattern and stores the result;
/// concurrent callers for the same missing pattern compile at most twice
/// (read-check under the shared lock, then a second check under the
/// exclusive lock before inserting) and all callers observe one of the
/// successfully compiled instances, because the exclusive-lock holder wins
/// and late arrivals see its entry.
pub struct RegexCache {
    entries: RwLock<HashMap<String, Arc<Regex>>>,
    max_size: usize,
}

impl RegexCache {
    pub fn new(config: RegexCacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_size: config.max_size,
        }
    }

    /// Get a shared compiled regex for `pattern`, compiling and caching it
    /// on first request. On an invalid pattern, returns the compilation
    /// error without caching anything.
    pub fn get(&self, pattern: &str) -> Result<Arc<Regex>> {
        // Shared-lock fast path: pattern already compiled.
        {
            let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
            if let Some(re) = entries.get(pattern) {
                return Ok(Arc::clone(re));
            }
        }

        // Exclusive lock: double-check, then compile if still missing.
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        if let Some(re) = entries.get(pattern) {
            return Ok(Arc::clone(re));
        }

        let compiled = Regex::new(pattern).map_err(|source| SentinelError::RegexCompilationFailed {
            pattern: pattern.to_string(),
            source,
        })?;
        let compiled = Arc::new(compiled);

        if entries.len() >= self.max_size {
            tracing::debug!(
                max_size = self.max_size,
                "regex cache at capacity, clearing before insert"
            );
            entries.clear();
        }
        entries.insert(pattern.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Number of patterns currently cached.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict every cached pattern.
    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new(RegexCacheConfig::default())
    }
}
