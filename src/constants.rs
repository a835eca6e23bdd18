// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Server defaults
// =============================================================================

/// Default request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Path prefix of the controller's own control endpoints
pub const CONTROL_PATH_PREFIX: &str = "/__sw/";

/// Response header naming where a controller-served response came from
pub const CACHE_SOURCE_HEADER: &str = "X-Cache-Source";

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

/// Default maximum URI length (8 KB)
pub const DEFAULT_MAX_URI_LENGTH: usize = 8192;

/// Default maximum request body size accepted on control endpoints (1 MB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

// =============================================================================
// Upstream (content API) defaults
// =============================================================================

/// Default upstream fetch timeout in seconds
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Controller defaults
// =============================================================================

/// Default cache generation identifier
pub const DEFAULT_CACHE_VERSION: &str = "mani-news-v1.0.0";

/// Page served to navigations when neither network nor cache can answer
pub const DEFAULT_OFFLINE_URL: &str = "/offline.html";

/// Image served when an image request fails and has no cached copy
pub const DEFAULT_FALLBACK_IMAGE: &str = "/images/placeholder.jpg";

/// Critical assets stored at install time
pub const DEFAULT_PRECACHE_URLS: &[&str] = &[
    "/",
    "/css/output.css",
    "/js/main.js",
    "/offline.html",
    "/images/logo.png",
    "/images/placeholder.jpg",
    "/icons/icon-192x192.png",
    "/icons/icon-512x512.png",
];

/// Prefixes served network-first
pub const DEFAULT_NETWORK_FIRST_PREFIXES: &[&str] = &["/api/", "/noticia/", "/categoria/", "/buscar"];

/// Prefixes served cache-first
pub const DEFAULT_CACHE_FIRST_PREFIXES: &[&str] =
    &["/css/", "/js/", "/images/", "/icons/", "/uploads/"];

// =============================================================================
// Background sync defaults
// =============================================================================

/// Sync tag registered when a mutating action happens offline
pub const NEWS_SYNC_TAG: &str = "news-sync";

/// Periodic sync tag
pub const NEWS_UPDATE_TAG: &str = "news-update";

/// Endpoint refetched by the news sync task
pub const NEWS_LATEST_URL: &str = "/api/news/latest";

/// Payload broadcast to client views after a successful news sync
pub const NEWS_UPDATED_DATA: &str = "New content available";

// =============================================================================
// Push notification defaults
// =============================================================================

/// Title shown on every push notification
pub const NOTIFICATION_DISPLAY_TITLE: &str = "Mani News";

/// Body used when the push payload carries none
pub const DEFAULT_PUSH_BODY: &str = "Nova notícia importante disponível!";

/// Target URL used when the push payload carries none
pub const DEFAULT_PUSH_URL: &str = "/";

/// Title stored with the notification when the push payload carries none
pub const DEFAULT_PUSH_TITLE: &str = "Nova Notícia";

/// Notification tag (replaces earlier notifications with the same tag)
pub const NOTIFICATION_TAG: &str = "news-notification";

/// Notification icon
pub const NOTIFICATION_ICON: &str = "/icons/icon-192x192.png";

/// Monochrome badge shown in the status bar
pub const NOTIFICATION_BADGE: &str = "/icons/badge-72x72.png";

/// Large image attached to the notification
pub const NOTIFICATION_IMAGE: &str = "/images/notification-image.jpg";

/// Vibration pattern in milliseconds (on, off, on)
pub const NOTIFICATION_VIBRATE: &[u32] = &[100, 50, 100];

// =============================================================================
// Cache defaults
// =============================================================================

/// Default maximum stored response size in megabytes
pub const DEFAULT_MAX_ITEM_SIZE_MB: u64 = 10;

/// Default directory for the disk cache backend
pub const DEFAULT_CACHE_DIR: &str = "/var/cache/mani-offline";
