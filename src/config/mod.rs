// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::cache::CacheConfig;
use crate::logging::LoggingConfig;

pub mod controller;
pub mod server;

pub use controller::{ControllerConfig, UpstreamConfig};
pub use server::{SecurityLimitsConfig, ServerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub controller: ControllerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        let mut config: Config = serde_yaml::from_str(&substituted).map_err(|e| e.to_string())?;
        config.controller.origin = config.controller.origin.trim_end_matches('/').to_string();

        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.address.is_empty() {
            return Err("server.address cannot be empty".to_string());
        }
        if self.server.threads == 0 {
            return Err("server.threads must be greater than 0".to_string());
        }

        self.upstream.endpoint()?;
        if self.upstream.timeout_secs == 0 {
            return Err("upstream.timeout_secs must be greater than 0".to_string());
        }

        let controller = &self.controller;
        if !(controller.origin.starts_with("http://") || controller.origin.starts_with("https://"))
        {
            return Err(format!(
                "controller.origin '{}' must start with http:// or https://",
                controller.origin
            ));
        }
        if controller.version.trim().is_empty() {
            return Err("controller.version cannot be empty".to_string());
        }

        // Check rule prefixes
        let mut seen_prefixes = HashSet::new();
        for rule in &controller.rules {
            if !rule.prefix.starts_with('/') {
                return Err(format!(
                    "Rule prefix '{}' does not start with /",
                    rule.prefix
                ));
            }
            if !seen_prefixes.insert(&rule.prefix) {
                return Err(format!("Duplicate rule prefix '{}'", rule.prefix));
            }
        }

        for url in &controller.precache {
            if !url.starts_with('/') {
                return Err(format!("Precache path '{}' does not start with /", url));
            }
        }
        for (name, path) in [
            ("offline_url", &controller.offline_url),
            ("fallback_image", &controller.fallback_image),
        ] {
            if !path.starts_with('/') {
                return Err(format!("controller.{} '{}' does not start with /", name, path));
            }
        }

        let mut seen_tags = HashSet::new();
        for task in &controller.sync_tasks {
            if task.tag.trim().is_empty() {
                return Err("Sync task tag cannot be empty".to_string());
            }
            if !seen_tags.insert(&task.tag) {
                return Err(format!("Duplicate sync task tag '{}'", task.tag));
            }
            if !task.refresh_url.starts_with('/') {
                return Err(format!(
                    "Sync task '{}' has refresh_url '{}' that does not start with /",
                    task.tag, task.refresh_url
                ));
            }
        }

        self.cache.validate()?;
        Ok(())
    }
}
