//! Cache-first and network-first response strategies
//!
//! Both strategies work against one cache generation. Storage errors never abort a
//! request: a failed read is a miss and a failed write is skipped, after logging.
//! When a write fails because the storage quota is exhausted, the strategy asks its
//! `QuotaRecovery` to free space and retries the write once, into whichever
//! generation serves after recovery. Writes never recreate a generation that was
//! deleted while the request was in flight.

use async_trait::async_trait;
use serde::Serialize;

use crate::cache::{CacheError, CacheStorage, CachedResponse, RequestKey};
use crate::fetch::{FetchError, FetchRequest, FetchResponse, Fetcher};
use crate::metrics::ControllerMetrics;

/// Where a strategy's response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    FallbackImage,
    OfflinePage,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::FallbackImage => "fallback_image",
            ResponseSource::OfflinePage => "offline_page",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyResponse {
    pub response: FetchResponse,
    pub source: ResponseSource,
}

impl StrategyResponse {
    fn new(response: FetchResponse, source: ResponseSource) -> Self {
        ControllerMetrics::global()
            .responses
            .with_label_values(&[source.as_str()])
            .inc();
        Self { response, source }
    }
}

/// Frees storage after a quota failure
#[async_trait]
pub trait QuotaRecovery: Send + Sync {
    /// Returns the generation serving after recovery, or None when nothing was freed
    async fn recover_quota(&self) -> Option<String>;
}

/// Everything a strategy needs to answer one request
pub struct StrategyContext<'a> {
    pub storage: &'a dyn CacheStorage,
    pub fetcher: &'a dyn Fetcher,
    /// Generation to read from and write to; None before the first activation
    pub generation: Option<&'a str>,
    pub fallback_image: &'a str,
    pub offline_url: &'a str,
    pub quota: Option<&'a dyn QuotaRecovery>,
}

impl<'a> StrategyContext<'a> {
    /// Cache lookup; storage errors count as a miss
    pub async fn lookup(&self, key: &RequestKey) -> Option<CachedResponse> {
        let generation = self.generation?;
        let metrics = ControllerMetrics::global();
        match self.storage.get(generation, key).await {
            Ok(Some(found)) => {
                metrics.cache_hits.inc();
                Some(found)
            }
            Ok(None) => {
                metrics.cache_misses.inc();
                None
            }
            Err(e) => {
                metrics.cache_errors.inc();
                tracing::warn!(
                    generation = %generation,
                    key = %key,
                    error = %e,
                    "Cache lookup failed, treating as miss"
                );
                None
            }
        }
    }

    /// Store a copy of a network response; returns true when it was written
    pub async fn store(&self, key: RequestKey, response: &FetchResponse) -> bool {
        let Some(generation) = self.generation else {
            return false;
        };
        let metrics = ControllerMetrics::global();

        let mut target = generation.to_string();
        let mut result = self
            .storage
            .put_existing(&target, key.clone(), response.to_cached())
            .await;

        if let Err(CacheError::QuotaExceeded { required, quota }) = &result {
            tracing::warn!(
                key = %key,
                required_bytes = required,
                quota_bytes = quota,
                "Storage quota exceeded while caching response"
            );
            if let Some(recovery) = self.quota {
                if let Some(serving) = recovery.recover_quota().await {
                    target = serving;
                    result = self
                        .storage
                        .put_existing(&target, key.clone(), response.to_cached())
                        .await;
                }
            }
        }

        match result {
            Ok(()) => {
                metrics.cache_stores.inc();
                true
            }
            Err(CacheError::GenerationMissing(_)) => {
                tracing::debug!(
                    generation = %target,
                    key = %key,
                    "Generation replaced while the request was in flight, write skipped"
                );
                false
            }
            Err(e) => {
                metrics.cache_errors.inc();
                tracing::warn!(
                    generation = %target,
                    key = %key,
                    error = %e,
                    "Cache write skipped"
                );
                false
            }
        }
    }

    async fn fallback_image(&self) -> Option<FetchResponse> {
        self.lookup(&RequestKey::get(self.fallback_image))
            .await
            .map(FetchResponse::from)
    }

    async fn offline_page(&self) -> Option<FetchResponse> {
        self.lookup(&RequestKey::get(self.offline_url))
            .await
            .map(FetchResponse::from)
    }
}

/// Serve from cache when present, otherwise fetch and store
///
/// A failed image request falls back to the cached placeholder image. Other
/// failures propagate: a non-success response is passed through unchanged and a
/// network error is returned as an error.
pub async fn cache_first(
    ctx: &StrategyContext<'_>,
    request: &FetchRequest,
) -> Result<StrategyResponse, FetchError> {
    let key = request.cache_key();

    if let Some(cached) = ctx.lookup(&key).await {
        tracing::debug!(key = %key, "Serving from cache");
        return Ok(StrategyResponse::new(cached.into(), ResponseSource::Cache));
    }

    match ctx.fetcher.fetch(request).await {
        Ok(response) if response.is_success() => {
            ctx.store(key, &response).await;
            Ok(StrategyResponse::new(response, ResponseSource::Network))
        }
        Ok(response) => {
            if request.is_image() {
                if let Some(fallback) = ctx.fallback_image().await {
                    tracing::info!(
                        key = %key,
                        status = response.status,
                        "Image fetch unsuccessful, serving fallback image"
                    );
                    return Ok(StrategyResponse::new(fallback, ResponseSource::FallbackImage));
                }
            }
            Ok(StrategyResponse::new(response, ResponseSource::Network))
        }
        Err(e) => {
            ControllerMetrics::global().network_failures.inc();
            if request.is_image() {
                if let Some(fallback) = ctx.fallback_image().await {
                    tracing::info!(key = %key, error = %e, "Image fetch failed, serving fallback image");
                    return Ok(StrategyResponse::new(fallback, ResponseSource::FallbackImage));
                }
            }
            tracing::warn!(key = %key, error = %e, "Cache-first fetch failed with no fallback");
            Err(e)
        }
    }
}

/// Fetch first and refresh the cache; fall back to the cache when offline
///
/// Navigations with no cached copy get the offline page. A non-success network
/// response is returned as-is and not stored.
pub async fn network_first(
    ctx: &StrategyContext<'_>,
    request: &FetchRequest,
) -> Result<StrategyResponse, FetchError> {
    let key = request.cache_key();

    match ctx.fetcher.fetch(request).await {
        Ok(response) => {
            if response.is_success() {
                ctx.store(key, &response).await;
            }
            Ok(StrategyResponse::new(response, ResponseSource::Network))
        }
        Err(e) => {
            ControllerMetrics::global().network_failures.inc();

            if let Some(cached) = ctx.lookup(&key).await {
                tracing::info!(key = %key, error = %e, "Network unavailable, serving cached copy");
                return Ok(StrategyResponse::new(cached.into(), ResponseSource::Cache));
            }

            if request.is_navigation() {
                if let Some(offline) = ctx.offline_page().await {
                    tracing::info!(key = %key, error = %e, "Network unavailable, serving offline page");
                    return Ok(StrategyResponse::new(offline, ResponseSource::OfflinePage));
                }
            }

            tracing::warn!(key = %key, error = %e, "Network-first fetch failed with no cached copy");
            Err(e)
        }
    }
}
