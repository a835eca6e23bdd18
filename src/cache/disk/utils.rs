//! Utility functions for disk storage

use crate::cache::RequestKey;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Convert a RequestKey to a SHA256 hash for use as a filename
pub fn key_to_hash(key: &RequestKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.method.as_bytes());
    hasher.update(b" ");
    hasher.update(key.url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Directory name for a generation id (ids are free-form version strings)
pub fn generation_dir_name(generation: &str) -> String {
    let digest = Sha256::digest(generation.as_bytes());
    format!("gen-{}", &hex::encode(digest)[..16])
}

/// Path of the metadata file for a key inside a generation directory
pub fn meta_path(generation_dir: &Path, key: &RequestKey) -> PathBuf {
    generation_dir.join(format!("{}.meta", key_to_hash(key)))
}

/// Fresh body file name for a key; every write gets its own body file
pub fn new_data_file_name(key: &RequestKey) -> String {
    format!("{}-{}.data", key_to_hash(key), uuid::Uuid::new_v4().simple())
}

pub fn system_time_to_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn millis_to_system_time(millis: u64) -> SystemTime {
    UNIX_EPOCH + std::time::Duration::from_millis(millis)
}
