// Request pipeline module - per-request context carried through the proxy phases

use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::router::Classification;
use crate::strategy::ResponseSource;

/// Per-request state shared between the Pingora phases
///
/// `request_filter` fills in the classification and, when the controller answers
/// the request itself, the response source; `logging` reads them back.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    classification: Option<Classification>,
    source: Option<ResponseSource>,
    started: Instant,
}

impl RequestContext {
    /// Create a new RequestContext with a fresh UUID v4 request ID
    pub fn new(method: String, path: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method,
            path,
            classification: None,
            source: None,
            started: Instant::now(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Record the method and path once the request header is available
    pub fn set_request(&mut self, method: &str, path: &str) {
        self.method = method.to_string();
        self.path = path.to_string();
    }

    pub fn classification(&self) -> Option<Classification> {
        self.classification
    }

    pub fn set_classification(&mut self, classification: Classification) {
        self.classification = Some(classification);
    }

    /// Where the response came from; None when it was proxied upstream
    pub fn source(&self) -> Option<ResponseSource> {
        self.source
    }

    pub fn set_source(&mut self, source: ResponseSource) {
        self.source = Some(source);
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("GET".to_string(), "/".to_string())
    }
}
