//! `CacheStorage` implementation over a filesystem backend

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;

use super::backend::DiskBackend;
use super::error::DiskCacheError;
use super::tokio_backend::TokioFsBackend;
use super::types::{EntryMetadata, GenerationManifest, GenerationRecord};
use super::utils::{
    generation_dir_name, meta_path, millis_to_system_time, new_data_file_name,
    system_time_to_millis,
};
use crate::cache::stats::{CacheStats, CacheStatsTracker};
use crate::cache::{CacheConfig, CacheError, CacheStorage, CachedResponse, RequestKey};

const MANIFEST_FILE: &str = "generations.json";

/// Loaded manifest plus byte usage per generation
struct DiskState {
    manifest: GenerationManifest,
    used_bytes: HashMap<String, u64>,
}

impl DiskState {
    fn total_used(&self) -> u64 {
        self.used_bytes.values().sum()
    }

    fn record(&self, generation: &str) -> Option<&GenerationRecord> {
        self.manifest.generations.iter().find(|r| r.id == generation)
    }
}

/// Durable generation storage rooted at a cache directory
pub struct DiskCacheStorage {
    root: PathBuf,
    backend: Arc<dyn DiskBackend>,
    // Loaded lazily on first use; writers hold the lock for the whole write
    state: Mutex<Option<DiskState>>,
    stats: CacheStatsTracker,
    max_item_size_bytes: u64,
    quota_bytes: Option<u64>,
}

impl DiskCacheStorage {
    /// Create a disk storage rooted at `config.cache_dir`
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_backend(config, Arc::new(TokioFsBackend::new()))
    }

    /// Create a disk storage with an explicit filesystem backend
    pub fn with_backend(config: &CacheConfig, backend: Arc<dyn DiskBackend>) -> Self {
        Self {
            root: PathBuf::from(&config.cache_dir),
            backend,
            state: Mutex::new(None),
            stats: CacheStatsTracker::new(),
            max_item_size_bytes: config.max_item_size_bytes(),
            quota_bytes: config.quota_bytes(),
        }
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    async fn load_state(&self) -> Result<DiskState, DiskCacheError> {
        self.backend.create_dir_all(&self.root).await?;

        let manifest = match self.backend.read_file(&self.manifest_path()).await {
            Ok(bytes) => serde_json::from_slice::<GenerationManifest>(&bytes)
                .map_err(|e| DiskCacheError::ManifestCorrupted(e.to_string()))?,
            Err(DiskCacheError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                GenerationManifest::default()
            }
            Err(e) => return Err(e),
        };

        let mut used_bytes = HashMap::new();
        for record in &manifest.generations {
            let dir = self.root.join(&record.dir);
            let mut used = 0;
            for meta in self.read_all_metadata(&dir).await? {
                used += meta.size_bytes;
            }
            used_bytes.insert(record.id.clone(), used);
        }

        tracing::debug!(
            cache_dir = %self.root.display(),
            generations = manifest.generations.len(),
            "Loaded disk cache manifest"
        );

        Ok(DiskState {
            manifest,
            used_bytes,
        })
    }

    async fn persist_manifest(&self, manifest: &GenerationManifest) -> Result<(), DiskCacheError> {
        let data = serde_json::to_vec_pretty(manifest)?;
        self.backend
            .write_file_atomic(&self.manifest_path(), Bytes::from(data))
            .await
    }

    /// Lock the state, loading it from disk on first use
    async fn locked_state(
        &self,
    ) -> Result<tokio::sync::MutexGuard<'_, Option<DiskState>>, DiskCacheError> {
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            *guard = Some(self.load_state().await?);
        }
        Ok(guard)
    }

    async fn generation_dir(&self, generation: &str) -> Result<Option<PathBuf>, DiskCacheError> {
        let guard = self.locked_state().await?;
        Ok(guard
            .as_ref()
            .and_then(|state| state.record(generation))
            .map(|record| self.root.join(&record.dir)))
    }

    async fn read_metadata(&self, path: &Path) -> Result<Option<EntryMetadata>, DiskCacheError> {
        match self.backend.read_file(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(DiskCacheError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_all_metadata(&self, dir: &Path) -> Result<Vec<EntryMetadata>, DiskCacheError> {
        let mut metas = Vec::new();
        for path in self.backend.read_dir(dir).await? {
            if path.extension().and_then(|e| e.to_str()) != Some("meta") {
                continue;
            }
            if let Some(meta) = self.read_metadata(&path).await? {
                metas.push(meta);
            }
        }
        Ok(metas)
    }

    /// Record a new generation in the manifest and create its directory
    async fn add_generation(
        &self,
        state: &mut DiskState,
        generation: &str,
    ) -> Result<PathBuf, DiskCacheError> {
        let record = GenerationRecord {
            id: generation.to_string(),
            dir: generation_dir_name(generation),
            created_at: system_time_to_millis(SystemTime::now()),
        };
        let dir = self.root.join(&record.dir);
        self.backend.create_dir_all(&dir).await?;
        state.manifest.generations.push(record);
        state.used_bytes.insert(generation.to_string(), 0);
        self.persist_manifest(&state.manifest).await?;
        tracing::info!(generation = %generation, "Created cache generation on disk");
        Ok(dir)
    }

    /// Write one entry; a missing generation is created only when `create` is set
    ///
    /// Every check runs before anything touches the disk, so a rejected write
    /// leaves no trace.
    async fn store(
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

        let mut guard = self.locked_state().await?;
        let state = guard
            .as_mut()
            .ok_or_else(|| CacheError::ConfigurationError("disk state not loaded".to_string()))?;

        let existing = state.record(generation).map(|r| self.root.join(&r.dir));
        if existing.is_none() && !create {
            return Err(CacheError::GenerationMissing(generation.to_string()));
        }

        let previous = match &existing {
            Some(dir) => self.read_metadata(&meta_path(dir, &key)).await?,
            None => None,
        };
        let replaced = previous.as_ref().map(|m| m.size_bytes).unwrap_or(0);

        if let Some(quota) = self.quota_bytes {
            let required = state.total_used() - replaced + size as u64;
            if required > quota {
                return Err(CacheError::QuotaExceeded { required, quota });
            }
        }

        let dir = match existing {
            Some(dir) => dir,
            None => self.add_generation(state, generation).await?,
        };
        let meta_file = meta_path(&dir, &key);

        let data_file = new_data_file_name(&key);
        self.backend
            .write_file_atomic(&dir.join(&data_file), response.body.clone())
            .await?;

        let meta = EntryMetadata {
            key,
            status: response.status,
            headers: response.headers,
            data_file,
            size_bytes: size as u64,
            stored_at: system_time_to_millis(response.stored_at),
        };
        let meta_bytes = serde_json::to_vec(&meta)?;
        self.backend
            .write_file_atomic(&meta_file, Bytes::from(meta_bytes))
            .await?;

        if let Some(previous) = previous {
            self.backend
                .delete_file(&dir.join(&previous.data_file))
                .await?;
        }

        let used = state.used_bytes.entry(generation.to_string()).or_insert(0);
        *used = *used - replaced + size as u64;

        self.stats.increment_stores();
        Ok(())
    }

    /// Read one entry; None when the metadata or its body file is gone
    async fn read_entry(
        &self,
        dir: &Path,
        key: &RequestKey,
    ) -> Result<Option<CachedResponse>, DiskCacheError> {
        let Some(meta) = self.read_metadata(&meta_path(dir, key)).await? else {
            return Ok(None);
        };
        match self.backend.read_file(&dir.join(&meta.data_file)).await {
            Ok(body) => Ok(Some(CachedResponse {
                status: meta.status,
                headers: meta.headers,
                body,
                stored_at: millis_to_system_time(meta.stored_at),
            })),
            Err(DiskCacheError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn get(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let Some(dir) = self.generation_dir(generation).await? else {
            self.stats.increment_misses();
            return Ok(None);
        };

        // A concurrent overwrite may delete the body file between the two reads;
        // the second attempt sees the replacement metadata.
        let mut found = self.read_entry(&dir, key).await?;
        if found.is_none() {
            found = self.read_entry(&dir, key).await?;
        }

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
        self.store(generation, key, response, true).await
    }

    async fn put_existing(
        &self,
        generation: &str,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), CacheError> {
        self.store(generation, key, response, false).await
    }

    async fn create_generation(&self, generation: &str) -> Result<bool, CacheError> {
        let mut guard = self.locked_state().await?;
        let state = guard
            .as_mut()
            .ok_or_else(|| CacheError::ConfigurationError("disk state not loaded".to_string()))?;
        if state.record(generation).is_some() {
            return Ok(false);
        }
        self.add_generation(state, generation).await?;
        Ok(true)
    }

    async fn delete(&self, generation: &str, key: &RequestKey) -> Result<bool, CacheError> {
        let mut guard = self.locked_state().await?;
        let Some(state) = guard.as_mut() else {
            return Ok(false);
        };
        let Some(record) = state.record(generation) else {
            return Ok(false);
        };
        let dir = self.root.join(&record.dir);

        let meta_file = meta_path(&dir, key);
        let Some(meta) = self.read_metadata(&meta_file).await? else {
            return Ok(false);
        };

        self.backend.delete_file(&meta_file).await?;
        self.backend.delete_file(&dir.join(&meta.data_file)).await?;

        if let Some(used) = state.used_bytes.get_mut(generation) {
            *used = used.saturating_sub(meta.size_bytes);
        }
        Ok(true)
    }

    async fn keys(&self, generation: &str) -> Result<Vec<RequestKey>, CacheError> {
        let Some(dir) = self.generation_dir(generation).await? else {
            return Ok(Vec::new());
        };
        let mut keys: Vec<RequestKey> = self
            .read_all_metadata(&dir)
            .await?
            .into_iter()
            .map(|meta| meta.key)
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn list_generations(&self) -> Result<Vec<String>, CacheError> {
        let guard = self.locked_state().await?;
        Ok(guard
            .as_ref()
            .map(|state| {
                state
                    .manifest
                    .generations
                    .iter()
                    .map(|r| r.id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, CacheError> {
        let mut guard = self.locked_state().await?;
        let Some(state) = guard.as_mut() else {
            return Ok(false);
        };
        let Some(position) = state
            .manifest
            .generations
            .iter()
            .position(|r| r.id == generation)
        else {
            return Ok(false);
        };

        let record = state.manifest.generations.remove(position);
        state.used_bytes.remove(generation);
        // Manifest first: a crash mid-removal leaves an orphan directory, never a
        // manifest entry pointing at half-deleted files
        self.persist_manifest(&state.manifest).await?;
        self.backend
            .remove_dir_all(&self.root.join(&record.dir))
            .await?;

        tracing::info!(generation = %generation, "Deleted cache generation from disk");
        Ok(true)
    }

    async fn stats(&self, generation: &str) -> Result<CacheStats, CacheError> {
        let size = {
            let guard = self.locked_state().await?;
            guard
                .as_ref()
                .and_then(|state| state.used_bytes.get(generation).copied())
                .unwrap_or(0)
        };
        let count = self.keys(generation).await?.len() as u64;
        Ok(self.stats.snapshot(size, count))
    }
}
