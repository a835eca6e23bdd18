//! Cache storage trait definition
//!
//! This module defines the `CacheStorage` trait that all storage backends must satisfy.
//! Storage is partitioned into generations: every entry belongs to exactly one
//! generation, and whole generations are dropped when a newer one takes over.

use async_trait::async_trait;

use super::entry::{CachedResponse, RequestKey};
use super::error::CacheError;
use super::stats::CacheStats;

/// Durable, generation-partitioned response storage (memory, disk)
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Look up a stored response in the given generation
    /// Returns None if the generation or the key does not exist
    async fn get(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<CachedResponse>, CacheError>;

    /// Store a response, creating the generation if it does not exist yet
    /// Replaces any previous entry for the same key as a single operation
    async fn put(
        &self,
        generation: &str,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), CacheError>;

    /// Store a response into a generation that already exists
    /// Fails with `CacheError::GenerationMissing` when it does not; nothing is written then
    async fn put_existing(
        &self,
        generation: &str,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), CacheError>;

    /// Create an empty generation
    /// Returns true if it did not exist before
    async fn create_generation(&self, generation: &str) -> Result<bool, CacheError>;

    /// Delete an entry
    /// Returns true if the entry existed and was deleted
    async fn delete(&self, generation: &str, key: &RequestKey) -> Result<bool, CacheError>;

    /// List the keys stored in a generation
    async fn keys(&self, generation: &str) -> Result<Vec<RequestKey>, CacheError>;

    /// List all generations, oldest first (creation order)
    async fn list_generations(&self) -> Result<Vec<String>, CacheError>;

    /// Delete a generation with all its entries
    /// Returns true if the generation existed
    async fn delete_generation(&self, generation: &str) -> Result<bool, CacheError>;

    /// Statistics for one generation
    async fn stats(&self, generation: &str) -> Result<CacheStats, CacheError>;
}
