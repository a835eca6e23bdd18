//! Memory storage implementation
//!
//! `MemoryCacheStorage` keeps every generation in a process-local map guarded by a
//! `parking_lot::RwLock`. The lock is never held across an await point, so a write
//! replaces an entry as a single step and readers never observe a partial entry.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::entry::{CachedResponse, RequestKey};
use super::error::CacheError;
use super::stats::{CacheStats, CacheStatsTracker};
use super::traits::CacheStorage;
use super::CacheConfig;

struct Generation {
    id: String,
    entries: HashMap<RequestKey, CachedResponse>,
    size_bytes: u64,
}

impl Generation {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            entries: HashMap::new(),
            size_bytes: 0,
        }
    }
}

/// In-memory generation-partitioned storage
pub struct MemoryCacheStorage {
    // Creation order: oldest first
    generations: RwLock<Vec<Generation>>,
    stats: CacheStatsTracker,
    max_item_size_bytes: u64,
    quota_bytes: Option<u64>,
}

impl MemoryCacheStorage {
    /// Create a new MemoryCacheStorage from configuration
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            generations: RwLock::new(Vec::new()),
            stats: CacheStatsTracker::new(),
            max_item_size_bytes: config.max_item_size_bytes(),
            quota_bytes: config.quota_bytes(),
        }
    }

    fn insert(
        &self,
        generation: &str,
        key: RequestKey,
        response: CachedResponse,
        create: bool,
    ) -> Result<(), CacheError> {
        let size = response.size_bytes();
        if size as u64 > self.max_item_size_bytes {
            return Err(CacheError::EntryTooLarge {
                size,
                limit: self.max_item_size_bytes as usize,
            });
        }

        let mut generations = self.generations.write();
        let existing = generations.iter().position(|g| g.id == generation);
        if existing.is_none() && !create {
            return Err(CacheError::GenerationMissing(generation.to_string()));
        }

        if let Some(quota) = self.quota_bytes {
            let replaced = existing
                .and_then(|index| generations[index].entries.get(&key))
                .map(|e| e.size_bytes() as u64)
                .unwrap_or(0);
            let used: u64 = generations.iter().map(|g| g.size_bytes).sum();
            let required = used - replaced + size as u64;
            if required > quota {
                return Err(CacheError::QuotaExceeded { required, quota });
            }
        }

        let index = match existing {
            Some(index) => index,
            None => {
                generations.push(Generation::new(generation));
                generations.len() - 1
            }
        };
        let target = &mut generations[index];
        if let Some(previous) = target.entries.insert(key, response) {
            target.size_bytes -= previous.size_bytes() as u64;
        }
        target.size_bytes += size as u64;

        self.stats.increment_stores();
        Ok(())
    }

    /// Total bytes held across all generations
    pub fn total_size_bytes(&self) -> u64 {
        self.generations.read().iter().map(|g| g.size_bytes).sum()
    }
}

impl Default for MemoryCacheStorage {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn get(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let generations = self.generations.read();
        let found = generations
            .iter()
            .find(|g| g.id == generation)
            .and_then(|g| g.entries.get(key))
            .cloned();

        if found.is_some() {
            self.stats.increment_hits();
        } else {
            self.stats.increment_misses();
        }
        Ok(found)
    }

    async fn put(
        &self,
        generation: &str,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), CacheError> {
        self.insert(generation, key, response, true)
    }

    async fn put_existing(
        &self,
        generation: &str,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), CacheError> {
        self.insert(generation, key, response, false)
    }

    async fn create_generation(&self, generation: &str) -> Result<bool, CacheError> {
        let mut generations = self.generations.write();
        if generations.iter().any(|g| g.id == generation) {
            return Ok(false);
        }
        generations.push(Generation::new(generation));
        Ok(true)
    }

    async fn delete(&self, generation: &str, key: &RequestKey) -> Result<bool, CacheError> {
        let mut generations = self.generations.write();
        let Some(target) = generations.iter_mut().find(|g| g.id == generation) else {
            return Ok(false);
        };
        match target.entries.remove(key) {
            Some(previous) => {
                target.size_bytes -= previous.size_bytes() as u64;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn keys(&self, generation: &str) -> Result<Vec<RequestKey>, CacheError> {
        let generations = self.generations.read();
        let mut keys: Vec<RequestKey> = generations
            .iter()
            .find(|g| g.id == generation)
            .map(|g| g.entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn list_generations(&self) -> Result<Vec<String>, CacheError> {
        Ok(self
            .generations
            .read()
            .iter()
            .map(|g| g.id.clone())
            .collect())
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, CacheError> {
        let mut generations = self.generations.write();
        let before = generations.len();
        generations.retain(|g| g.id != generation);
        Ok(generations.len() != before)
    }

    async fn stats(&self, generation: &str) -> Result<CacheStats, CacheError> {
        let generations = self.generations.read();
        let (size, count) = generations
            .iter()
            .find(|g| g.id == generation)
            .map(|g| (g.size_bytes, g.entries.len() as u64))
            .unwrap_or((0, 0));
        Ok(self.stats.snapshot(size, count))
    }
}
