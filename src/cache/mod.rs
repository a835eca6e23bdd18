// Cache module

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::constants::{DEFAULT_CACHE_DIR, DEFAULT_MAX_ITEM_SIZE_MB};

pub mod disk;
pub mod entry;
pub mod error;
pub mod memory;
pub mod stats;
pub mod traits;

pub use disk::DiskCacheStorage;
pub use entry::{CachedResponse, RequestKey};
pub use error::CacheError;
pub use memory::MemoryCacheStorage;
pub use stats::CacheStats;
pub use traits::CacheStorage;

/// Storage backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local storage, lost on restart
    #[default]
    Memory,
    /// Generation directories on the local filesystem
    Disk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_max_item_size_mb")]
    pub max_item_size_mb: u64,
    /// Total storage quota across all generations (0 = unlimited)
    #[serde(default)]
    pub quota_mb: u64,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            max_item_size_mb: default_max_item_size_mb(),
            quota_mb: 0,
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_max_item_size_mb() -> u64 {
    DEFAULT_MAX_ITEM_SIZE_MB
}

fn default_cache_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

impl CacheConfig {
    /// Convert max_item_size_mb to bytes
    pub fn max_item_size_bytes(&self) -> u64 {
        self.max_item_size_mb * 1024 * 1024
    }

    /// Convert quota_mb to bytes (None when unlimited)
    pub fn quota_bytes(&self) -> Option<u64> {
        if self.quota_mb == 0 {
            None
        } else {
            Some(self.quota_mb * 1024 * 1024)
        }
    }

    /// Validate cache configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_item_size_mb == 0 {
            return Err("max_item_size_mb must be greater than 0".to_string());
        }
        if self.quota_mb != 0 && self.max_item_size_mb > self.quota_mb {
            return Err(format!(
                "max_item_size_mb ({}) cannot be greater than quota_mb ({})",
                self.max_item_size_mb, self.quota_mb
            ));
        }
        if self.backend == CacheBackend::Disk && self.cache_dir.is_empty() {
            return Err("cache_dir cannot be empty when the disk backend is selected".to_string());
        }
        Ok(())
    }
}

/// Build the configured storage backend
pub fn build_storage(config: &CacheConfig) -> Arc<dyn CacheStorage> {
    match config.backend {
        CacheBackend::Memory => Arc::new(MemoryCacheStorage::new(config)),
        CacheBackend::Disk => Arc::new(DiskCacheStorage::new(config)),
    }
}
