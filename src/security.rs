//! Security Validation Module
//!
//! Front-door checks applied before a request is classified:
//! - Oversized control-endpoint bodies
//! - Overlong URIs
//! - Query strings carrying literal script tags or SQL keywords
//!
//! The pattern screen is a literal filter, not an escaping or sanitizing layer.
//!
//! Returns appropriate HTTP status codes:
//! - 413 Payload Too Large - Request body exceeds limit
//! - 414 URI Too Long - URI exceeds limit
//! - 400 Bad Request - Suspicious query content

use regex::Regex;
use std::sync::OnceLock;

use crate::constants::{DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_URI_LENGTH};

/// Security validation error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    /// Request body too large (413)
    PayloadTooLarge { size: usize, limit: usize },
    /// URI too long (414)
    UriTooLong { length: usize, limit: usize },
    /// Query matched a screened pattern (400)
    SuspiciousContent { pattern: &'static str },
}

impl SecurityError {
    pub fn status_code(&self) -> u16 {
        match self {
            SecurityError::PayloadTooLarge { .. } => 413,
            SecurityError::UriTooLong { .. } => 414,
            SecurityError::SuspiciousContent { .. } => 400,
        }
    }

    /// Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            SecurityError::PayloadTooLarge { .. } => "payload_too_large",
            SecurityError::UriTooLong { .. } => "uri_too_long",
            SecurityError::SuspiciousContent { .. } => "suspicious_content",
        }
    }
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::PayloadTooLarge { size, limit } => {
                write!(f, "Request payload size {} exceeds limit {}", size, limit)
            }
            SecurityError::UriTooLong { length, limit } => {
                write!(f, "URI length {} exceeds limit {}", length, limit)
            }
            SecurityError::SuspiciousContent { pattern } => {
                write!(f, "Query matched screened pattern: {}", pattern)
            }
        }
    }
}

impl std::error::Error for SecurityError {}

/// Front-door limits
pub struct SecurityLimits {
    /// Maximum control-endpoint body size in bytes (default: 1 MB)
    pub max_body_size: usize,
    /// Maximum URI length (default: 8192 bytes)
    pub max_uri_length: usize,
    /// Whether query strings are screened
    pub screen_patterns: bool,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_uri_length: DEFAULT_MAX_URI_LENGTH,
            screen_patterns: true,
        }
    }
}

/// Validate request body size
pub fn validate_body_size(
    content_length: Option<usize>,
    limit: usize,
) -> Result<(), SecurityError> {
    if let Some(size) = content_length {
        if size > limit {
            return Err(SecurityError::PayloadTooLarge { size, limit });
        }
    }
    Ok(())
}

/// Validate URI length
pub fn validate_uri_length(uri: &str, limit: usize) -> Result<(), SecurityError> {
    let length = uri.len();
    if length > limit {
        return Err(SecurityError::UriTooLong { length, limit });
    }
    Ok(())
}

fn script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)<script\b[^>]*>.*?</script>").expect("script pattern is valid")
    })
}

fn sql_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|UNION|SCRIPT)\b|'[\s\S]*'",
        )
        .expect("sql pattern is valid")
    })
}

/// Screen a raw query string (percent-encoded, `+` for spaces)
pub fn screen_query(query: &str) -> Result<(), SecurityError> {
    if query.is_empty() {
        return Ok(());
    }
    let spaced = query.replace('+', " ");
    let decoded = urlencoding::decode(&spaced)
        .map(|d| d.into_owned())
        .unwrap_or(spaced);

    if script_pattern().is_match(&decoded) {
        return Err(SecurityError::SuspiciousContent { pattern: "script" });
    }
    if sql_pattern().is_match(&decoded) {
        return Err(SecurityError::SuspiciousContent { pattern: "sql" });
    }
    Ok(())
}

/// Run every front-door check for a request
pub fn validate_request(
    uri: &str,
    query: Option<&str>,
    limits: &SecurityLimits,
) -> Result<(), SecurityError> {
    validate_uri_length(uri, limits.max_uri_length)?;
    if limits.screen_patterns {
        if let Some(query) = query {
            screen_query(query)?;
        }
    }
    Ok(())
}
