//! Controller configuration: origin, generation, manifests and sync tasks.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_VERSION, DEFAULT_FALLBACK_IMAGE, DEFAULT_OFFLINE_URL, DEFAULT_PRECACHE_URLS,
    DEFAULT_UPSTREAM_TIMEOUT_SECS,
};
use crate::router::{default_rules, ClassificationRule};
use crate::sync::{default_sync_tasks, SyncTaskConfig};

fn default_version() -> String {
    DEFAULT_CACHE_VERSION.to_string()
}

fn default_precache() -> Vec<String> {
    DEFAULT_PRECACHE_URLS.iter().map(|u| u.to_string()).collect()
}

fn default_offline_url() -> String {
    DEFAULT_OFFLINE_URL.to_string()
}

fn default_fallback_image() -> String {
    DEFAULT_FALLBACK_IMAGE.to_string()
}

fn default_upstream_timeout() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

/// Content API the controller fetches from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// e.g. `http://127.0.0.1:3000`
    pub base_url: String,
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    /// `(host, port, tls)` parsed from `base_url`
    pub fn endpoint(&self) -> Result<(String, u16, bool), String> {
        let (tls, rest) = if let Some(rest) = self.base_url.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            (false, rest)
        } else {
            return Err(format!(
                "upstream base_url '{}' must start with http:// or https://",
                self.base_url
            ));
        };

        let authority = rest.split('/').next().unwrap_or(rest);
        if authority.is_empty() {
            return Err(format!("upstream base_url '{}' has no host", self.base_url));
        }

        match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("upstream base_url '{}' has an invalid port", self.base_url))?;
                Ok((host.to_string(), port, tls))
            }
            None => Ok((authority.to_string(), if tls { 443 } else { 80 }, tls)),
        }
    }
}

/// Immutable controller settings, shared behind an `Arc`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Origin the controller serves, e.g. `https://mani.news`
    pub origin: String,
    /// Cache generation id
    #[serde(default = "default_version")]
    pub version: String,
    /// Ordered classification manifest; first match wins
    #[serde(default = "default_rules")]
    pub rules: Vec<ClassificationRule>,
    /// Paths stored at install time
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,
    #[serde(default = "default_offline_url")]
    pub offline_url: String,
    #[serde(default = "default_fallback_image")]
    pub fallback_image: String,
    /// Activate a freshly installed generation without waiting for consumers
    #[serde(default)]
    pub skip_waiting_on_install: bool,
    #[serde(default = "default_sync_tasks")]
    pub sync_tasks: Vec<SyncTaskConfig>,
}

impl ControllerConfig {
    /// Defaults for everything except the origin
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            version: default_version(),
            rules: default_rules(),
            precache: default_precache(),
            offline_url: default_offline_url(),
            fallback_image: default_fallback_image(),
            skip_waiting_on_install: false,
            sync_tasks: default_sync_tasks(),
        }
    }

    pub fn sync_task(&self, tag: &str) -> Option<&SyncTaskConfig> {
        self.sync_tasks.iter().find(|t| t.tag == tag)
    }
}
