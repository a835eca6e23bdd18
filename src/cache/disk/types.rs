//! Type definitions for disk storage

use serde::{Deserialize, Serialize};

use crate::cache::RequestKey;

/// Metadata for a stored response on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub key: RequestKey,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Name of the body file inside the generation directory
    pub data_file: String,
    pub size_bytes: u64,
    /// Milliseconds since the Unix epoch
    pub stored_at: u64,
}

/// One generation recorded in the manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationRecord {
    pub id: String,
    /// Directory name under the cache root
    pub dir: String,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
}

/// Manifest listing every generation, oldest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationManifest {
    #[serde(default)]
    pub generations: Vec<GenerationRecord>,
}
