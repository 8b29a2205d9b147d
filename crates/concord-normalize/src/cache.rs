//! Explicit normalization cache, passed through the call chain.
//!
//! Replaces the ambient global dictionaries of earlier designs. Entries are
//! keyed by `(raw constraint digest, IR snapshot digest)` so a cached result
//! is only ever reused for the identical input against the identical IR;
//! ingesting new raw constraints fires the invalidation hook.

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::{NormalizedConstraint, RawConstraint};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    raw_digest: String,
    ir_digest: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

/// Run-scoped cache of normalization results.
#[derive(Debug, Default)]
pub struct NormalizationCache {
    entries: RwLock<AHashMap<CacheKey, NormalizedConstraint>>,
    stats: RwLock<CacheStats>,
}

impl NormalizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, raw: &RawConstraint, ir_digest: &str) -> Option<NormalizedConstraint> {
        let key = CacheKey {
            raw_digest: raw.digest(),
            ir_digest: ir_digest.to_string(),
        };
        let found = self.entries.read().get(&key).cloned();
        let mut stats = self.stats.write();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }

    pub fn store(&self, raw: &RawConstraint, ir_digest: &str, normalized: NormalizedConstraint) {
        let key = CacheKey {
            raw_digest: raw.digest(),
            ir_digest: ir_digest.to_string(),
        };
        self.entries.write().insert(key, normalized);
    }

    /// Invalidation hook: fired whenever new raw constraints are ingested.
    pub fn invalidate(&self) {
        self.entries.write().clear();
        self.stats.write().invalidations += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.read()
    }
}
