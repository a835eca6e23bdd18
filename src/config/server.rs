//! Server configuration types.
//!
//! This module defines the server-level configuration including:
//! - Address and port bindings
//! - Request timeout and worker threads
//! - Front-door limits (body size, URI length, pattern screening)
//!
//! Default values are sourced from `crate::constants`.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_URI_LENGTH, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_THREADS,
};

// Default timeout values
fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

// Default worker thread count
fn default_threads() -> usize {
    DEFAULT_THREADS
}

// Default security limit values
fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

fn default_max_uri_length() -> usize {
    DEFAULT_MAX_URI_LENGTH
}

fn default_true() -> bool {
    true
}

/// Front-door limits applied before classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityLimitsConfig {
    /// Maximum body size accepted on control endpoints (default: 1 MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Maximum URI length in bytes (default: 8 KB)
    #[serde(default = "default_max_uri_length")]
    pub max_uri_length: usize,
    /// Reject query strings carrying script tags or SQL keywords (default: true)
    #[serde(default = "default_true")]
    pub screen_patterns: bool,
}

impl Default for SecurityLimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: default_max_body_size(),
            max_uri_length: default_max_uri_length(),
            screen_patterns: true,
        }
    }
}

impl SecurityLimitsConfig {
    /// Convert to SecurityLimits from security module
    pub fn to_security_limits(&self) -> crate::security::SecurityLimits {
        crate::security::SecurityLimits {
            max_body_size: self.max_body_size,
            max_uri_length: self.max_uri_length,
            screen_patterns: self.screen_patterns,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// Number of worker threads (default: 4)
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default)]
    pub security_limits: SecurityLimitsConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_limits_config_default() {
        let config = SecurityLimitsConfig::default();

        assert_eq!(config.max_body_size, DEFAULT_MAX_BODY_SIZE);
        assert_eq!(config.max_uri_length, DEFAULT_MAX_URI_LENGTH);
        assert!(config.screen_patterns);
    }

    #[test]
    fn test_security_limits_config_deserialize_defaults() {
        let yaml = "{}";
        let config: SecurityLimitsConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.max_body_size, DEFAULT_MAX_BODY_SIZE);
        assert_eq!(config.max_uri_length, DEFAULT_MAX_URI_LENGTH);
        assert!(config.screen_patterns);
    }

    #[test]
    fn test_security_limits_config_deserialize_custom() {
        let yaml = r#"
max_body_size: 2048
max_uri_length: 4096
screen_patterns: false
"#;
        let config: SecurityLimitsConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.max_body_size, 2048);
        assert_eq!(config.max_uri_length, 4096);
        assert!(!config.screen_patterns);

        let limits = config.to_security_limits();
        assert_eq!(limits.max_uri_length, 4096);
        assert!(!limits.screen_patterns);
    }

    #[test]
    fn test_server_config_defaults() {
        let yaml = r#"
address: "0.0.0.0"
port: 8080
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.threads, DEFAULT_THREADS);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.security_limits.max_uri_length, DEFAULT_MAX_URI_LENGTH);
    }
}
