//! Cache statistics types
//!
//! This module provides structures for tracking cache usage:
//! - `CacheStats`: Backend-wide counters plus the size of one generation
//! - `CacheStatsTracker`: Lock-free counters shared by a storage backend

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics for monitoring and the `/__sw/status` endpoint
///
/// `hits`, `misses` and `stores` count over the whole backend; the size fields
/// describe the generation the snapshot was taken for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of lookups answered from storage
    pub hits: u64,
    /// Number of lookups that found nothing
    pub misses: u64,
    /// Number of successful writes
    pub stores: u64,
    /// Current size of the generation in bytes
    pub current_size_bytes: u64,
    /// Current number of entries in the generation
    pub current_item_count: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total lookups)
    /// Returns 0.0 if there were no lookups
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Statistics tracker using atomics for thread safety
#[derive(Debug, Default)]
pub(crate) struct CacheStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
}

impl CacheStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stores(&self) {
        self.stores.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot combining the counters with the current generation size
    pub fn snapshot(&self, current_size_bytes: u64, current_item_count: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            current_size_bytes,
            current_item_count,
        }
    }
}
