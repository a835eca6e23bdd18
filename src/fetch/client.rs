//! Production `Fetcher` backed by reqwest

use async_trait::async_trait;
use std::time::Duration;

use super::{FetchError, FetchRequest, FetchResponse, Fetcher};

// Headers owned by the connection, never forwarded upstream
const SKIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "upgrade",
];

/// Fetches same-origin requests from the content API
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    /// Create a fetcher resolving request paths against `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(FetchError::InvalidUrl(base_url.to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network {
                url: base_url.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Upstream URL for a request's path and query
    pub fn resolve(&self, request: &FetchRequest) -> String {
        format!("{}{}", self.base_url, request.path_and_query())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let url = self.resolve(request);
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|_| FetchError::InvalidUrl(format!("{} {}", request.method, url)))?;

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            if SKIPPED_REQUEST_HEADERS
                .iter()
                .any(|skipped| name.eq_ignore_ascii_case(skipped))
            {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        let started = std::time::Instant::now();
        let response = builder.send().await.map_err(|e| map_error(&url, e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(|e| map_error(&url, e))?;

        tracing::debug!(
            url = %url,
            status = status,
            body_bytes = body.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Upstream fetch completed"
        );

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
