//! Request identity and stored response types
//!
//! This module defines the core cache entry structures:
//! - `RequestKey`: Request identity (method + path and query) used as the cache key
//! - `CachedResponse`: Stored response (status, headers, body) with the time it was stored

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Request identity for cached responses
///
/// Only GET requests are ever stored, but the method is kept in the key so that
/// the on-disk format stays self-describing.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    /// HTTP method (always "GET" for stored entries)
    pub method: String,
    /// Path and query of the request, e.g. `/api/posts?page=2`
    pub url: String,
}

impl RequestKey {
    /// Build the key of a GET request for the given path (and optional query)
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
        }
    }

    /// Path portion of the key (query stripped)
    pub fn path(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "METHOD encoded_url"
        write!(f, "{} {}", self.method, url_encode_key(&self.url))
    }
}

/// Encode a key component, preserving the characters that make up ordinary paths and queries
fn url_encode_key(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'a'..=b'z'
            | b'A'..=b'Z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'~'
            | b'/'
            | b'?'
            | b'&'
            | b'='
            | b'%' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

impl std::str::FromStr for RequestKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (method, url) = s
            .split_once(' ')
            .ok_or_else(|| "Invalid request key format: missing ' ' separator".to_string())?;

        if method.is_empty() {
            return Err("Invalid request key format: method cannot be empty".to_string());
        }
        if !url.starts_with('/') {
            return Err(format!(
                "Invalid request key format: url '{}' must start with /",
                url
            ));
        }

        let url = urlencoding::decode(url)
            .map_err(|e| format!("Invalid request key encoding: {}", e))?
            .into_owned();

        Ok(RequestKey {
            method: method.to_string(),
            url,
        })
    }
}

/// Response stored in a cache generation
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    /// HTTP status code of the stored response
    pub status: u16,
    /// Response headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
    /// When this copy was written to the cache
    pub stored_at: SystemTime,
}

impl CachedResponse {
    /// Create a stored copy stamped with the current time
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: SystemTime::now(),
        }
    }

    /// Look up a header value (case-insensitive name match)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Content-Type of the stored response, if any
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Approximate size of this entry in bytes (body plus header text)
    pub fn size_bytes(&self) -> usize {
        let headers: usize = self.headers.iter().map(|(k, v)| k.len() + v.len()).sum();
        self.body.len() + headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_key_uses_get_method() {
        let key = RequestKey::get("/css/output.css");
        assert_eq!(key.method, "GET");
        assert_eq!(key.url, "/css/output.css");
    }

    #[test]
    fn test_path_strips_query() {
        let key = RequestKey::get("/buscar?q=economia");
        assert_eq!(key.path(), "/buscar");

        let key = RequestKey::get("/noticia/1");
        assert_eq!(key.path(), "/noticia/1");
    }

    #[test]
    fn test_keys_with_same_url_are_equal() {
        assert_eq!(RequestKey::get("/a"), RequestKey::get("/a"));
        assert_ne!(RequestKey::get("/a"), RequestKey::get("/b"));
    }

    #[test]
    fn test_display_and_parse_preserve_key() {
        let key = RequestKey::get("/buscar?q=notícia boa");
        let rendered = key.to_string();
        assert!(rendered.starts_with("GET /buscar?q="));
        assert_eq!(rendered.matches(' ').count(), 1);

        let parsed: RequestKey = rendered.parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        let result = "GET/no-space".parse::<RequestKey>();
        assert!(result.unwrap_err().contains("missing ' ' separator"));
    }

    #[test]
    fn test_parse_rejects_relative_url() {
        let result = "GET relative/path".parse::<RequestKey>();
        assert!(result.unwrap_err().contains("must start with /"));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = CachedResponse::new(
            200,
            vec![("Content-Type".to_string(), "image/png".to_string())],
            Bytes::from_static(b"png"),
        );
        assert_eq!(response.header("content-type"), Some("image/png"));
        assert_eq!(response.content_type(), Some("image/png"));
        assert_eq!(response.header("etag"), None);
    }

    #[test]
    fn test_size_includes_headers() {
        let response = CachedResponse::new(
            200,
            vec![("a".to_string(), "bc".to_string())],
            Bytes::from_static(b"12345"),
        );
        assert_eq!(response.size_bytes(), 8);
    }
}
