//! Generation lifecycle: install, wait, activate, reclaim
//!
//! Each cache generation moves through `Installing -> Installed -> Activating ->
//! Active -> Redundant`. Transitions that touch storage are serialized by an async
//! mutex; the observable state sits behind a `parking_lot` lock that is never held
//! across an await.

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cache::{CacheError, CacheStorage, CachedResponse, RequestKey};
use crate::error::ControllerError;
use crate::fetch::{FetchError, FetchRequest, Fetcher};
use crate::metrics::ControllerMetrics;
use crate::strategy::QuotaRecovery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Installing,
    /// Installed and waiting for activation
    Installed,
    Activating,
    Active,
    Redundant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationInfo {
    pub id: String,
    pub state: GenerationState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub active: String,
    pub previous: Option<String>,
    /// Generations removed from storage
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub version: String,
    /// Number of manifest entries stored
    pub cached: usize,
    /// Present when the install activated the generation right away
    pub activated: Option<ActivationReport>,
}

/// Snapshot for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleStatus {
    pub active: Option<String>,
    pub waiting: Option<String>,
    pub consumers: usize,
    pub generations: Vec<GenerationInfo>,
}

#[derive(Debug, Default)]
struct LifecycleState {
    active: Option<String>,
    waiting: Option<String>,
    generations: Vec<GenerationInfo>,
    consumers: usize,
    // SKIP_WAITING arrived while nothing was waiting
    skip_waiting: bool,
}

impl LifecycleState {
    fn mark(&mut self, id: &str, state: GenerationState) {
        match self.generations.iter_mut().find(|g| g.id == id) {
            Some(info) => info.state = state,
            None => self.generations.push(GenerationInfo {
                id: id.to_string(),
                state,
            }),
        }
    }

    fn state_of(&self, id: &str) -> Option<GenerationState> {
        self.generations
            .iter()
            .find(|g| g.id == id)
            .map(|g| g.state)
    }
}

/// Fetch every URL concurrently; any error or non-2xx response fails the batch
pub async fn fetch_all(
    fetcher: &dyn Fetcher,
    urls: &[String],
) -> Result<Vec<(RequestKey, CachedResponse)>, FetchError> {
    let requests: Vec<FetchRequest> = urls.iter().map(|u| FetchRequest::get(u.as_str())).collect();
    let results = join_all(requests.iter().map(|r| fetcher.fetch(r))).await;

    let mut entries = Vec::with_capacity(requests.len());
    for (request, result) in requests.iter().zip(results) {
        match result {
            Ok(response) if response.is_success() => {
                entries.push((request.cache_key(), response.to_cached()))
            }
            Ok(response) => {
                return Err(FetchError::Status {
                    url: request.url.clone(),
                    status: response.status,
                })
            }
            Err(e) => return Err(e),
        }
    }
    Ok(entries)
}

/// Write a fetched batch into an existing generation, all or nothing
///
/// When a write fails, entries written earlier in the batch are rolled back: keys
/// that were new are deleted and replaced keys get their previous response back.
pub async fn write_entries(
    storage: &dyn CacheStorage,
    generation: &str,
    entries: Vec<(RequestKey, CachedResponse)>,
) -> Result<(), CacheError> {
    let mut written: Vec<(RequestKey, Option<CachedResponse>)> = Vec::with_capacity(entries.len());
    for (key, response) in entries {
        let outcome = match storage.get(generation, &key).await {
            Ok(previous) => storage
                .put_existing(generation, key.clone(), response)
                .await
                .map(|()| previous),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(previous) => written.push((key, previous)),
            Err(e) => {
                roll_back(storage, generation, written).await;
                return Err(e);
            }
        }
    }
    Ok(())
}

async fn roll_back(
    storage: &dyn CacheStorage,
    generation: &str,
    written: Vec<(RequestKey, Option<CachedResponse>)>,
) {
    let count = written.len();
    for (key, previous) in written.into_iter().rev() {
        let result = match previous {
            Some(previous) => storage.put_existing(generation, key.clone(), previous).await,
            None => storage.delete(generation, &key).await.map(|_| ()),
        };
        if let Err(e) = result {
            tracing::error!(generation = %generation, key = %key, error = %e, "Failed to roll back cache write");
        }
    }
    if count > 0 {
        tracing::warn!(generation = %generation, entries = count, "Rolled back partial cache batch");
    }
}

pub struct Lifecycle {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    state: RwLock<LifecycleState>,
    transitions: Mutex<()>,
}

impl Lifecycle {
    pub fn new(storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            storage,
            fetcher,
            state: RwLock::new(LifecycleState::default()),
            transitions: Mutex::new(()),
        }
    }

    /// Generation currently serving lookups
    pub fn active_generation(&self) -> Option<String> {
        self.state.read().active.clone()
    }

    /// Installed generation waiting for activation
    pub fn waiting_generation(&self) -> Option<String> {
        self.state.read().waiting.clone()
    }

    pub fn generation_state(&self, id: &str) -> Option<GenerationState> {
        self.state.read().state_of(id)
    }

    pub fn status(&self) -> LifecycleStatus {
        let state = self.state.read();
        LifecycleStatus {
            active: state.active.clone(),
            waiting: state.waiting.clone(),
            consumers: state.consumers,
            generations: state.generations.clone(),
        }
    }

    /// Pre-populate `version` with the manifest, atomically
    ///
    /// On failure the new generation's storage is deleted and the previous active
    /// generation keeps serving. Reinstalling the active version refreshes it in place.
    pub async fn install(
        &self,
        version: &str,
        manifest: &[String],
    ) -> Result<InstallReport, ControllerError> {
        let _guard = self.transitions.lock().await;
        let is_active = self.active_generation().as_deref() == Some(version);
        if !is_active {
            self.state.write().mark(version, GenerationState::Installing);
        }
        tracing::info!(version = %version, urls = manifest.len(), "Installing cache generation");

        let entries = match fetch_all(self.fetcher.as_ref(), manifest).await {
            Ok(entries) => entries,
            Err(e) => return Err(self.fail_install(version, is_active, e.to_string()).await),
        };
        let cached = entries.len();
        if let Err(e) = self.storage.create_generation(version).await {
            return Err(self.fail_install(version, is_active, e.to_string()).await);
        }
        if let Err(e) = write_entries(self.storage.as_ref(), version, entries).await {
            return Err(self.fail_install(version, is_active, e.to_string()).await);
        }

        ControllerMetrics::global()
            .installs
            .with_label_values(&["success"])
            .inc();
        tracing::info!(version = %version, cached = cached, "Cache generation installed");

        if is_active {
            return Ok(InstallReport {
                version: version.to_string(),
                cached,
                activated: None,
            });
        }

        let activate_now = {
            let mut state = self.state.write();
            state.mark(version, GenerationState::Installed);
            if let Some(superseded) = state.waiting.replace(version.to_string()) {
                if superseded != version {
                    state.mark(&superseded, GenerationState::Redundant);
                }
            }
            state.active.is_none() || state.skip_waiting || state.consumers == 0
        };

        let activated = if activate_now {
            self.activate_locked().await?
        } else {
            tracing::info!(version = %version, "Generation waiting for consumers to release the active one");
            None
        };

        Ok(InstallReport {
            version: version.to_string(),
            cached,
            activated,
        })
    }

    async fn fail_install(&self, version: &str, is_active: bool, reason: String) -> ControllerError {
        ControllerMetrics::global()
            .installs
            .with_label_values(&["failure"])
            .inc();
        tracing::error!(version = %version, reason = %reason, "Cache generation install failed");

        if !is_active {
            if let Err(e) = self.storage.delete_generation(version).await {
                tracing::warn!(version = %version, error = %e, "Failed to remove partial generation");
            }
            let mut state = self.state.write();
            state.mark(version, GenerationState::Redundant);
            if state.waiting.as_deref() == Some(version) {
                state.waiting = None;
            }
        }

        ControllerError::Install {
            version: version.to_string(),
            reason,
        }
    }

    /// Activate the waiting generation, if any
    pub async fn activate(&self) -> Result<Option<ActivationReport>, ControllerError> {
        let _guard = self.transitions.lock().await;
        self.activate_locked().await
    }

    // Caller holds `transitions`
    async fn activate_locked(&self) -> Result<Option<ActivationReport>, ControllerError> {
        let (next, previous) = {
            let mut state = self.state.write();
            let Some(next) = state.waiting.take() else {
                return Ok(None);
            };
            state.mark(&next, GenerationState::Activating);
            (next, state.active.clone())
        };

        let deleted = match self.delete_all_except(&next).await {
            Ok(deleted) => deleted,
            Err(e) => {
                let mut state = self.state.write();
                state.mark(&next, GenerationState::Installed);
                state.waiting = Some(next);
                return Err(e.into());
            }
        };

        {
            let mut state = self.state.write();
            for id in &deleted {
                state.mark(id, GenerationState::Redundant);
            }
            if let Some(previous) = &previous {
                state.mark(previous, GenerationState::Redundant);
            }
            state.mark(&next, GenerationState::Active);
            state.active = Some(next.clone());
            state.skip_waiting = false;
        }

        let metrics = ControllerMetrics::global();
        metrics.activations.inc();
        metrics
            .generations_reclaimed
            .with_label_values(&["activation"])
            .inc_by(deleted.len() as u64);
        tracing::info!(
            active = %next,
            previous = ?previous,
            deleted = ?deleted,
            "Cache generation activated"
        );

        Ok(Some(ActivationReport {
            active: next,
            previous,
            deleted,
        }))
    }

    async fn delete_all_except(&self, keep: &str) -> Result<Vec<String>, CacheError> {
        let mut deleted = Vec::new();
        for generation in self.storage.list_generations().await? {
            if generation != keep && self.storage.delete_generation(&generation).await? {
                deleted.push(generation);
            }
        }
        Ok(deleted)
    }

    /// SKIP_WAITING: activate the waiting generation now, or the next one as soon
    /// as it finishes installing
    pub async fn skip_waiting(&self) -> Result<Option<ActivationReport>, ControllerError> {
        let _guard = self.transitions.lock().await;
        let has_waiting = {
            let mut state = self.state.write();
            if state.waiting.is_none() {
                state.skip_waiting = true;
            }
            state.waiting.is_some()
        };
        if has_waiting {
            self.activate_locked().await
        } else {
            Ok(None)
        }
    }

    /// A client view starts using the active generation
    pub fn attach_consumer(&self) -> Option<String> {
        let mut state = self.state.write();
        state.consumers += 1;
        state.active.clone()
    }

    /// A client view stops using the active generation; the last release lets a
    /// waiting generation activate
    pub async fn release_consumer(&self) -> Result<Option<ActivationReport>, ControllerError> {
        let should_activate = {
            let mut state = self.state.write();
            state.consumers = state.consumers.saturating_sub(1);
            state.consumers == 0 && state.waiting.is_some()
        };
        if !should_activate {
            return Ok(None);
        }
        let _guard = self.transitions.lock().await;
        self.activate_locked().await
    }

    /// Resume a generation left in storage by an earlier run
    ///
    /// Prefers `preferred` when it exists, otherwise the most recently created one.
    pub async fn adopt_existing(&self, preferred: &str) -> Result<Option<String>, CacheError> {
        let _guard = self.transitions.lock().await;
        let generations = self.storage.list_generations().await?;
        let chosen = if generations.iter().any(|g| g == preferred) {
            Some(preferred.to_string())
        } else {
            generations.last().cloned()
        };

        if let Some(id) = &chosen {
            let mut state = self.state.write();
            state.mark(id, GenerationState::Active);
            state.active = Some(id.clone());
            tracing::info!(generation = %id, "Adopted existing cache generation");
        }
        Ok(chosen)
    }

    /// Storage quota exhausted: delete every generation except the most recently created
    ///
    /// Runs under the transition lock so it never interleaves with install or activation.
    pub async fn reclaim_for_quota(&self) -> Result<Vec<String>, CacheError> {
        let _guard = self.transitions.lock().await;
        let generations = self.storage.list_generations().await?;
        let Some((newest, older)) = generations.split_last() else {
            return Ok(Vec::new());
        };

        let mut deleted = Vec::new();
        for generation in older {
            if self.storage.delete_generation(generation).await? {
                deleted.push(generation.clone());
            }
        }
        if deleted.is_empty() {
            return Ok(deleted);
        }

        {
            let mut state = self.state.write();
            for id in &deleted {
                state.mark(id, GenerationState::Redundant);
            }
            let active_deleted = state
                .active
                .as_ref()
                .map(|a| deleted.contains(a))
                .unwrap_or(false);
            if active_deleted {
                // The survivor takes over serving
                state.active = Some(newest.clone());
                if state.waiting.as_deref() == Some(newest.as_str()) {
                    state.waiting = None;
                }
                state.mark(newest, GenerationState::Active);
            }
        }

        ControllerMetrics::global()
            .generations_reclaimed
            .with_label_values(&["quota"])
            .inc_by(deleted.len() as u64);
        tracing::warn!(kept = %newest, deleted = ?deleted, "Storage quota exceeded, reclaimed old generations");
        Ok(deleted)
    }
}

#[async_trait]
impl QuotaRecovery for Lifecycle {
    async fn recover_quota(&self) -> Option<String> {
        match self.reclaim_for_quota().await {
            Ok(deleted) if deleted.is_empty() => None,
            Ok(_) => self.active_generation(),
            Err(e) => {
                tracing::error!(error = %e, "Quota recovery failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, MemoryCacheStorage};
    use crate::fetch::MockFetcher;
    use bytes::Bytes;

    fn manifest() -> Vec<String> {
        vec!["/".to_string(), "/offline.html".to_string(), "/js/main.js".to_string()]
    }

    fn network() -> Arc<MockFetcher> {
        Arc::new(
            MockFetcher::new()
                .with_route("/", "text/html", "home")
                .with_route("/offline.html", "text/html", "offline")
                .with_route("/js/main.js", "text/javascript", "main()"),
        )
    }

    fn lifecycle(storage: Arc<MemoryCacheStorage>, fetcher: Arc<MockFetcher>) -> Lifecycle {
        Lifecycle::new(storage, fetcher)
    }

    #[tokio::test]
    async fn test_first_install_activates_immediately() {
        let storage = Arc::new(MemoryCacheStorage::default());
        let lifecycle = lifecycle(storage.clone(), network());

        let report = lifecycle.install("v1", &manifest()).await.unwrap();
        assert_eq!(report.cached, 3);
        assert_eq!(report.activated.unwrap().active, "v1");
        assert_eq!(lifecycle.active_generation().as_deref(), Some("v1"));
        assert_eq!(lifecycle.generation_state("v1"), Some(GenerationState::Active));
        assert_eq!(storage.keys("v1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_install_leaves_previous_generation_active() {
        let storage = Arc::new(MemoryCacheStorage::default());
        let fetcher = network();
        let lifecycle = lifecycle(storage.clone(), fetcher.clone());
        lifecycle.install("v1", &manifest()).await.unwrap();

        fetcher.fail_route("/js/main.js");
        let err = lifecycle.install("v2", &manifest()).await.unwrap_err();
        assert!(matches!(err, ControllerError::Install { .. }));

        assert_eq!(lifecycle.active_generation().as_deref(), Some("v1"));
        assert_eq!(lifecycle.generation_state("v2"), Some(GenerationState::Redundant));
        assert_eq!(storage.list_generations().await.unwrap(), vec!["v1"]);
    }

    #[tokio::test]
    async fn test_non_success_manifest_entry_fails_install() {
        let storage = Arc::new(MemoryCacheStorage::default());
        let lifecycle = lifecycle(storage.clone(), network());

        let mut urls = manifest();
        urls.push("/icons/missing.png".to_string());
        let err = lifecycle.install("v1", &urls).await.unwrap_err();
        assert!(err.to_string().contains("/icons/missing.png returned 404"));
        assert!(lifecycle.active_generation().is_none());
        assert!(storage.list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_generation_waits_for_consumers() {
        let storage = Arc::new(MemoryCacheStorage::default());
        let lifecycle = lifecycle(storage.clone(), network());
        lifecycle.install("v1", &manifest()).await.unwrap();
        assert_eq!(lifecycle.attach_consumer().as_deref(), Some("v1"));

        let report = lifecycle.install("v2", &manifest()).await.unwrap();
        assert!(report.activated.is_none());
        assert_eq!(lifecycle.waiting_generation().as_deref(), Some("v2"));
        assert_eq!(lifecycle.generation_state("v2"), Some(GenerationState::Installed));
        assert_eq!(lifecycle.active_generation().as_deref(), Some("v1"));

        let activation = lifecycle.release_consumer().await.unwrap().unwrap();
        assert_eq!(activation.active, "v2");
        assert_eq!(activation.previous.as_deref(), Some("v1"));
        assert_eq!(activation.deleted, vec!["v1"]);
        assert_eq!(lifecycle.generation_state("v1"), Some(GenerationState::Redundant));
    }

    #[tokio::test]
    async fn test_skip_waiting_activates_and_removes_prior_entries() {
        let storage = Arc::new(MemoryCacheStorage::default());
        let lifecycle = lifecycle(storage.clone(), network());
        lifecycle.install("v1", &manifest()).await.unwrap();
        lifecycle.attach_consumer();
        lifecycle.install("v2", &manifest()).await.unwrap();

        let activation = lifecycle.skip_waiting().await.unwrap().unwrap();
        assert_eq!(activation.active, "v2");
        assert!(storage.keys("v1").await.unwrap().is_empty());
        assert_eq!(storage.list_generations().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn test_skip_waiting_before_install_applies_to_next_install() {
        let storage = Arc::new(MemoryCacheStorage::default());
        let lifecycle = lifecycle(storage.clone(), network());
        lifecycle.install("v1", &manifest()).await.unwrap();
        lifecycle.attach_consumer();

        assert!(lifecycle.skip_waiting().await.unwrap().is_none());
        let report = lifecycle.install("v2", &manifest()).await.unwrap();
        assert_eq!(report.activated.unwrap().active, "v2");
    }

    #[tokio::test]
    async fn test_reinstalling_active_version_refreshes_in_place() {
        let storage = Arc::new(MemoryCacheStorage::default());
        let fetcher = network();
        let lifecycle = lifecycle(storage.clone(), fetcher.clone());
        lifecycle.install("v1", &manifest()).await.unwrap();

        fetcher.set_route("/", "text/html", "home v2");
        let report = lifecycle.install("v1", &manifest()).await.unwrap();
        assert!(report.activated.is_none());
        assert_eq!(lifecycle.active_generation().as_deref(), Some("v1"));

        let entry = storage.get("v1", &RequestKey::get("/")).await.unwrap().unwrap();
        assert_eq!(entry.body, Bytes::from_static(b"home v2"));
    }

    #[tokio::test]
    async fn test_reclaim_keeps_most_recent_generation() {
        let storage = Arc::new(MemoryCacheStorage::default());
        for id in ["v1", "v2", "v3"] {
            storage
                .put(id, RequestKey::get("/"), CachedResponse::new(200, vec![], Bytes::new()))
                .await
                .unwrap();
        }
        let lifecycle = lifecycle(storage.clone(), network());
        lifecycle.adopt_existing("v1").await.unwrap();

        let deleted = lifecycle.reclaim_for_quota().await.unwrap();
        assert_eq!(deleted, vec!["v1", "v2"]);
        assert_eq!(storage.list_generations().await.unwrap(), vec!["v3"]);
        assert_eq!(lifecycle.active_generation().as_deref(), Some("v3"));

        assert!(lifecycle.recover_quota().await.is_none());
    }

    #[tokio::test]
    async fn test_quota_recovery_never_resurrects_reclaimed_generation() {
        use crate::strategy::{network_first, StrategyContext};

        let storage = Arc::new(MemoryCacheStorage::new(&CacheConfig {
            max_item_size_mb: 1,
            quota_mb: 1,
            ..Default::default()
        }));
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_route("/", "text/html", "home")
                .with_route("/offline.html", "text/html", "offline")
                .with_route("/js/main.js", "text/javascript", "main()")
                .with_route("/api/one", "application/json", Bytes::from(vec![1u8; 600 * 1024]))
                .with_route("/api/two", "application/json", Bytes::from(vec![2u8; 600 * 1024]))
                .with_route("/api/three", "application/json", "[]"),
        );
        let lifecycle = lifecycle(storage.clone(), fetcher.clone());
        lifecycle.install("A", &manifest()).await.unwrap();
        lifecycle.attach_consumer();
        lifecycle.install("B", &manifest()).await.unwrap();
        assert_eq!(lifecycle.waiting_generation().as_deref(), Some("B"));

        // A request that started while A was serving
        let ctx = StrategyContext {
            storage: storage.as_ref(),
            fetcher: fetcher.as_ref(),
            generation: Some("A"),
            fallback_image: "/images/placeholder.jpg",
            offline_url: "/offline.html",
            quota: Some(&lifecycle),
        };
        network_first(&ctx, &FetchRequest::get("/api/one")).await.unwrap();
        network_first(&ctx, &FetchRequest::get("/api/two")).await.unwrap();

        assert_eq!(lifecycle.active_generation().as_deref(), Some("B"));
        assert_eq!(storage.list_generations().await.unwrap(), vec!["B"]);
        assert!(storage
            .get("B", &RequestKey::get("/api/two"))
            .await
            .unwrap()
            .is_some());

        network_first(&ctx, &FetchRequest::get("/api/three")).await.unwrap();
        assert_eq!(storage.list_generations().await.unwrap(), vec!["B"]);
        assert!(storage.keys("A").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_write_after_activation_is_skipped() {
        use crate::strategy::{cache_first, StrategyContext};

        let storage = Arc::new(MemoryCacheStorage::default());
        let fetcher = network();
        let lifecycle = lifecycle(storage.clone(), fetcher.clone());
        lifecycle.install("v1", &manifest()).await.unwrap();
        lifecycle.install("v2", &manifest()).await.unwrap();
        assert_eq!(lifecycle.active_generation().as_deref(), Some("v2"));

        fetcher.set_route("/css/output.css", "text/css", "body{}");
        let ctx = StrategyContext {
            storage: storage.as_ref(),
            fetcher: fetcher.as_ref(),
            generation: Some("v1"),
            fallback_image: "/images/placeholder.jpg",
            offline_url: "/offline.html",
            quota: Some(&lifecycle),
        };
        cache_first(&ctx, &FetchRequest::get("/css/output.css")).await.unwrap();
        assert_eq!(storage.list_generations().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_in_place_restores_previous_entries() {
        let storage = Arc::new(MemoryCacheStorage::new(&CacheConfig {
            max_item_size_mb: 1,
            ..Default::default()
        }));
        let fetcher = network();
        let lifecycle = lifecycle(storage.clone(), fetcher.clone());
        lifecycle.install("v1", &manifest()).await.unwrap();

        fetcher.set_route("/", "text/html", "home v2");
        fetcher.set_route(
            "/js/main.js",
            "text/javascript",
            Bytes::from(vec![0u8; 2 * 1024 * 1024]),
        );
        let err = lifecycle.install("v1", &manifest()).await.unwrap_err();
        assert!(matches!(err, ControllerError::Install { .. }));

        assert_eq!(lifecycle.active_generation().as_deref(), Some("v1"));
        let home = storage.get("v1", &RequestKey::get("/")).await.unwrap().unwrap();
        assert_eq!(home.body, Bytes::from_static(b"home"));
        let script = storage.get("v1", &RequestKey::get("/js/main.js")).await.unwrap().unwrap();
        assert_eq!(script.body, Bytes::from_static(b"main()"));
    }

    #[tokio::test]
    async fn test_write_entries_removes_new_keys_on_failure() {
        let storage = MemoryCacheStorage::new(&CacheConfig {
            max_item_size_mb: 1,
            ..Default::default()
        });
        storage.create_generation("v1").await.unwrap();
        let entries = vec![
            (
                RequestKey::get("/a"),
                CachedResponse::new(200, vec![], Bytes::from_static(b"a")),
            ),
            (
                RequestKey::get("/b"),
                CachedResponse::new(200, vec![], Bytes::from(vec![0u8; 2 * 1024 * 1024])),
            ),
        ];

        let err = write_entries(&storage, "v1", entries).await.unwrap_err();
        assert!(matches!(err, CacheError::EntryTooLarge { .. }));
        assert!(storage.keys("v1").await.unwrap().is_empty());

        let missing = write_entries(
            &storage,
            "v9",
            vec![(RequestKey::get("/a"), CachedResponse::new(200, vec![], Bytes::new()))],
        )
        .await
        .unwrap_err();
        assert!(matches!(missing, CacheError::GenerationMissing(_)));
        assert_eq!(storage.list_generations().await.unwrap(), vec!["v1"]);
    }

    #[tokio::test]
    async fn test_install_with_empty_manifest_still_creates_generation() {
        let storage = Arc::new(MemoryCacheStorage::default());
        let lifecycle = lifecycle(storage.clone(), network());
        let report = lifecycle.install("v1", &[]).await.unwrap();
        assert_eq!(report.cached, 0);
        assert_eq!(storage.list_generations().await.unwrap(), vec!["v1"]);
    }

    #[tokio::test]
    async fn test_adopt_existing_prefers_configured_version() {
        let storage = Arc::new(MemoryCacheStorage::default());
        for id in ["v1", "v2"] {
            storage
                .put(id, RequestKey::get("/"), CachedResponse::new(200, vec![], Bytes::new()))
                .await
                .unwrap();
        }
        let lifecycle = lifecycle(storage.clone(), network());
        assert_eq!(
            lifecycle.adopt_existing("v1").await.unwrap().as_deref(),
            Some("v1")
        );

        let other = Lifecycle::new(storage.clone(), network());
        assert_eq!(
            other.adopt_existing("v9").await.unwrap().as_deref(),
            Some("v2")
        );

        let empty = Lifecycle::new(Arc::new(MemoryCacheStorage::default()), network());
        assert!(empty.adopt_existing("v1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_all_is_all_or_nothing() {
        let fetcher = network();
        let ok = fetch_all(fetcher.as_ref(), &manifest()).await.unwrap();
        assert_eq!(ok.len(), 3);

        fetcher.set_online(false);
        assert!(fetch_all(fetcher.as_ref(), &manifest()).await.is_err());
    }
}
