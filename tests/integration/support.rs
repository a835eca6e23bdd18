// Shared fixtures: an in-memory content API and controller builders

use std::sync::Arc;

use mani_offline::cache::{CacheStorage, MemoryCacheStorage};
use mani_offline::config::ControllerConfig;
use mani_offline::constants::DEFAULT_PRECACHE_URLS;
use mani_offline::controller::OfflineController;
use mani_offline::fetch::MockFetcher;

pub const ORIGIN: &str = "https://mani.news";
pub const VERSION: &str = "mani-news-v1.0.0";

/// Content API that serves every default precache asset
pub fn content_api() -> Arc<MockFetcher> {
    let fetcher = MockFetcher::new();
    for path in DEFAULT_PRECACHE_URLS {
        let content_type = if path.starts_with("/images/") || path.starts_with("/icons/") {
            "image/png"
        } else {
            "text/html"
        };
        fetcher.set_route(path, content_type, format!("asset {}", path));
    }
    Arc::new(fetcher)
}

pub fn controller_with(
    config: ControllerConfig,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<MockFetcher>,
) -> OfflineController {
    OfflineController::new(Arc::new(config), storage, fetcher)
}

pub fn controller(fetcher: Arc<MockFetcher>) -> (OfflineController, Arc<MemoryCacheStorage>) {
    let storage = Arc::new(MemoryCacheStorage::default());
    let controller = controller_with(ControllerConfig::new(ORIGIN), storage.clone(), fetcher);
    (controller, storage)
}
