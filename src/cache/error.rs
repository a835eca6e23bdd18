//! Cache error types
//!
//! This module defines error types for cache storage operations.

/// Cache error types
#[derive(Debug)]
pub enum CacheError {
    /// Entry is larger than the configured per-item limit
    EntryTooLarge { size: usize, limit: usize },
    /// Total storage quota would be exceeded by this write
    QuotaExceeded { required: u64, quota: u64 },
    /// The target generation does not exist (deleted or never created)
    GenerationMissing(String),
    /// I/O error (for disk storage)
    IoError(std::io::Error),
    /// Configuration error
    ConfigurationError(String),
    /// Serialization/deserialization error
    SerializationError(String),
}

impl CacheError {
    /// Whether this error signals that storage ran out of quota
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, CacheError::QuotaExceeded { .. })
    }
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::EntryTooLarge { size, limit } => {
                write!(f, "Cache entry of {} bytes exceeds item limit {}", size, limit)
            }
            CacheError::QuotaExceeded { required, quota } => {
                write!(
                    f,
                    "Storage quota exceeded: {} bytes required, quota is {} bytes",
                    required, quota
                )
            }
            CacheError::GenerationMissing(id) => write!(f, "Cache generation {} does not exist", id),
            CacheError::IoError(err) => write!(f, "I/O error: {}", err),
            CacheError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            CacheError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::IoError(err)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_is_detected() {
        let err = CacheError::QuotaExceeded {
            required: 10,
            quota: 5,
        };
        assert!(err.is_quota_exceeded());

        let err = CacheError::EntryTooLarge { size: 10, limit: 5 };
        assert!(!err.is_quota_exceeded());
    }

    #[test]
    fn test_cache_error_implements_error_trait() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<CacheError>();
    }

    #[test]
    fn test_cache_error_display() {
        let err = CacheError::EntryTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Cache entry of 2048 bytes exceeds item limit 1024"
        );

        let err = CacheError::QuotaExceeded {
            required: 1100,
            quota: 1000,
        };
        assert!(err.to_string().contains("quota exceeded"));

        let err = CacheError::GenerationMissing("v1".to_string());
        assert_eq!(err.to_string(), "Cache generation v1 does not exist");
    }

    #[test]
    fn test_cache_error_converts_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let cache_err: CacheError = io_err.into();
        assert!(matches!(cache_err, CacheError::IoError(_)));
        assert!(std::error::Error::source(&cache_err).is_some());
    }

    #[test]
    fn test_cache_error_converts_from_serde_error() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let cache_err: CacheError = serde_err.into();
        assert!(matches!(cache_err, CacheError::SerializationError(_)));
    }
}
