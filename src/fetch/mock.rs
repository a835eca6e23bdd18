//! In-memory `Fetcher` for tests and local demos
//!
//! Routes are keyed by path and query. Unknown routes answer 404. Switching the
//! fetcher offline makes every call fail with `FetchError::Network`.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{FetchError, FetchRequest, FetchResponse, Fetcher};

#[derive(Debug, Clone)]
enum MockRoute {
    Respond(FetchResponse),
    Fail,
}

/// Scriptable fake network with per-path call counting
#[derive(Debug)]
pub struct MockFetcher {
    routes: RwLock<HashMap<String, MockRoute>>,
    calls: RwLock<HashMap<String, usize>>,
    online: AtomicBool,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    /// Online fetcher with no routes
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            calls: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Answer `path` with a 200 and the given content type and body
    pub fn with_route(self, path: &str, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.set_route(path, content_type, body);
        self
    }

    /// Answer `path` with a 200, replacing any previous route
    pub fn set_route(&self, path: &str, content_type: &str, body: impl Into<Bytes>) {
        let response = FetchResponse::new(
            200,
            vec![("content-type".to_string(), content_type.to_string())],
            body,
        );
        self.set_response(path, response);
    }

    /// Answer `path` with an arbitrary response
    pub fn set_response(&self, path: &str, response: FetchResponse) {
        self.routes
            .write()
            .insert(path.to_string(), MockRoute::Respond(response));
    }

    /// Make `path` fail with a network error even while online
    pub fn fail_route(&self, path: &str) {
        self.routes.write().insert(path.to_string(), MockRoute::Fail);
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of fetches issued for `path` (including failed ones)
    pub fn call_count(&self, path: &str) -> usize {
        self.calls.read().get(path).copied().unwrap_or(0)
    }

    /// Number of fetches issued for any path
    pub fn total_calls(&self) -> usize {
        self.calls.read().values().sum()
    }

    pub fn reset_calls(&self) {
        self.calls.write().clear();
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let path = request.path_and_query().to_string();
        *self.calls.write().entry(path.clone()).or_insert(0) += 1;

        if !self.is_online() {
            return Err(FetchError::Network {
                url: path,
                message: "offline".to_string(),
            });
        }

        let route = self.routes.read().get(&path).cloned();
        match route {
            Some(MockRoute::Respond(response)) => Ok(response),
            Some(MockRoute::Fail) => Err(FetchError::Network {
                url: path,
                message: "connection reset".to_string(),
            }),
            None => Ok(FetchResponse::new(404, vec![], Bytes::from_static(b"Not Found"))),
        }
    }
}
