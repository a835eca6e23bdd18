// Router module: classifies outgoing requests into caching strategies

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CACHE_FIRST_PREFIXES, DEFAULT_NETWORK_FIRST_PREFIXES};
use crate::fetch::{normalize_origin, FetchRequest};

/// Caching strategy named by a classification rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
        }
    }
}

/// `{prefix, strategy}` entry of the classification manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub prefix: String,
    pub strategy: Strategy,
}

impl ClassificationRule {
    pub fn new(prefix: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            prefix: prefix.into(),
            strategy,
        }
    }
}

/// Result of classifying a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    CacheFirst,
    NetworkFirst,
    /// Not handled by the controller; goes straight to the network
    Bypass,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::CacheFirst => "cache-first",
            Classification::NetworkFirst => "network-first",
            Classification::Bypass => "bypass",
        }
    }
}

impl From<Strategy> for Classification {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::CacheFirst => Classification::CacheFirst,
            Strategy::NetworkFirst => Classification::NetworkFirst,
        }
    }
}

/// Built-in manifest: API and content pages network-first, static assets cache-first
pub fn default_rules() -> Vec<ClassificationRule> {
    DEFAULT_NETWORK_FIRST_PREFIXES
        .iter()
        .map(|p| ClassificationRule::new(*p, Strategy::NetworkFirst))
        .chain(
            DEFAULT_CACHE_FIRST_PREFIXES
                .iter()
                .map(|p| ClassificationRule::new(*p, Strategy::CacheFirst)),
        )
        .collect()
}

/// Ordered prefix classifier bound to the controller's origin
pub struct Router {
    origin: String,
    rules: Vec<ClassificationRule>,
}

impl Router {
    pub fn new(origin: &str, rules: Vec<ClassificationRule>) -> Self {
        Router {
            origin: normalize_origin(origin),
            rules,
        }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Relative URLs are same-origin; a default port is the same as none
    fn is_same_origin(&self, request: &FetchRequest) -> bool {
        match request.origin() {
            Some(origin) => normalize_origin(origin) == self.origin,
            None => true,
        }
    }

    /// Classify a request; first matching prefix wins
    pub fn classify(&self, request: &FetchRequest) -> Classification {
        if request.method != http::Method::GET {
            return Classification::Bypass;
        }
        if !self.is_same_origin(request) {
            return Classification::Bypass;
        }

        let path = request.path();
        if let Some(rule) = self.rules.iter().find(|r| path.starts_with(&r.prefix)) {
            return rule.strategy.into();
        }

        // Page loads that match no rule still get a fresh copy with an offline fallback
        if request.is_navigation() || request.accepts_html() {
            return Classification::NetworkFirst;
        }

        Classification::Bypass
    }
}
