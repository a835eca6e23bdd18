//! Error types for disk storage operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiskCacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Generation manifest corrupted: {0}")]
    ManifestCorrupted(String),
}

// Conversion to CacheError
impl From<DiskCacheError> for crate::cache::CacheError {
    fn from(err: DiskCacheError) -> Self {
        match err {
            DiskCacheError::Io(e) => crate::cache::CacheError::IoError(e),
            DiskCacheError::Serialization(e) => {
                crate::cache::CacheError::SerializationError(e.to_string())
            }
            DiskCacheError::ManifestCorrupted(msg) => {
                crate::cache::CacheError::SerializationError(msg)
            }
        }
    }
}
