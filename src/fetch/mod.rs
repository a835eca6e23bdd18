//! Network access for the controller
//!
//! The controller never talks to the content API directly; every network round
//! trip goes through the `Fetcher` trait so strategies can be exercised against
//! `mock::MockFetcher` in tests and `client::HttpFetcher` in production.

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{CachedResponse, RequestKey};

pub mod client;
pub mod mock;

pub use self::client::HttpFetcher;
pub use self::mock::MockFetcher;

/// How the request was issued by the client view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page navigation
    Navigate,
    #[default]
    SameOrigin,
    Cors,
    NoCors,
}

/// What the response will be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestDestination {
    Document,
    Image,
    Script,
    Style,
    Font,
    Manifest,
    #[default]
    Empty,
}

impl RequestDestination {
    /// Map a `Sec-Fetch-Dest` header value; unknown values map to `Empty`
    pub fn from_header(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" | "iframe" | "frame" => RequestDestination::Document,
            "image" => RequestDestination::Image,
            "script" | "worker" | "sharedworker" => RequestDestination::Script,
            "style" => RequestDestination::Style,
            "font" => RequestDestination::Font,
            "manifest" => RequestDestination::Manifest,
            _ => RequestDestination::Empty,
        }
    }
}

impl RequestMode {
    /// Map a `Sec-Fetch-Mode` header value
    pub fn from_header(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "navigate" => RequestMode::Navigate,
            "cors" => RequestMode::Cors,
            "no-cors" => RequestMode::NoCors,
            _ => RequestMode::SameOrigin,
        }
    }
}

/// Canonical form of an origin for comparison
///
/// Lowercases scheme and host and drops the port when it is the scheme's default,
/// so `https://Mani.News:443` and `https://mani.news` compare equal.
pub fn normalize_origin(origin: &str) -> String {
    let origin = origin.trim_end_matches('/').to_ascii_lowercase();
    let default_port = if origin.starts_with("https://") {
        ":443"
    } else if origin.starts_with("http://") {
        ":80"
    } else {
        return origin;
    };
    match origin.strip_suffix(default_port) {
        Some(stripped) => stripped.to_string(),
        None => origin,
    }
}

/// An outgoing request as seen by the controller
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    /// Absolute URL (`https://host/path`) or a path relative to the controller origin
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub mode: RequestMode,
    pub destination: RequestDestination,
}

impl FetchRequest {
    /// Plain GET for a path, as issued by `fetch(url)`
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            mode: RequestMode::default(),
            destination: RequestDestination::default(),
        }
    }

    /// Top-level page navigation to a path
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            mode: RequestMode::Navigate,
            destination: RequestDestination::Document,
            headers: vec![("accept".to_string(), "text/html".to_string())],
            ..Self::get(url)
        }
    }

    /// Image load for a path
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            destination: RequestDestination::Image,
            mode: RequestMode::NoCors,
            ..Self::get(url)
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn is_image(&self) -> bool {
        self.destination == RequestDestination::Image
    }

    /// True when the Accept header asks for HTML
    pub fn accepts_html(&self) -> bool {
        self.header("accept")
            .map(|accept| accept.contains("text/html"))
            .unwrap_or(false)
    }

    /// Origin (`scheme://host[:port]`) of an absolute URL; None for relative URLs
    pub fn origin(&self) -> Option<&str> {
        let rest_start = self.url.find("://")? + 3;
        let end = self.url[rest_start..]
            .find(['/', '?', '#'])
            .map(|i| rest_start + i)
            .unwrap_or(self.url.len());
        Some(&self.url[..end])
    }

    /// Path and query of the URL, without the origin or fragment
    pub fn path_and_query(&self) -> &str {
        let without_origin = match self.origin() {
            Some(origin) => &self.url[origin.len()..],
            None => self.url.as_str(),
        };
        let without_fragment = without_origin.split('#').next().unwrap_or(without_origin);
        if without_fragment.is_empty() {
            "/"
        } else {
            without_fragment
        }
    }

    /// Path of the URL (query stripped)
    pub fn path(&self) -> &str {
        let pq = self.path_and_query();
        pq.split('?').next().unwrap_or(pq)
    }

    /// Cache identity of this request
    pub fn cache_key(&self) -> RequestKey {
        RequestKey {
            method: self.method.as_str().to_string(),
            url: self.path_and_query().to_string(),
        }
    }
}

/// A response obtained from the network or rebuilt from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Copy suitable for storing; the body is shared, not duplicated
    pub fn to_cached(&self) -> CachedResponse {
        CachedResponse::new(self.status, self.headers.clone(), self.body.clone())
    }
}

impl From<CachedResponse> for FetchResponse {
    fn from(cached: CachedResponse) -> Self {
        Self {
            status: cached.status,
            headers: cached.headers,
            body: cached.body,
        }
    }
}

/// Network failures (a non-2xx response is not an error at this layer)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    /// Raised by callers that need a 2xx answer (install, CACHE_URLS)
    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Network access seam
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}
