// Generation lifecycle across client views, restarts and quota pressure

use bytes::Bytes;
use std::sync::Arc;

use mani_offline::cache::{
    CacheBackend, CacheConfig, CacheStorage, CachedResponse, DiskCacheStorage, MemoryCacheStorage,
    RequestKey,
};
use mani_offline::config::ControllerConfig;
use mani_offline::controller::{ControllerEvent, EventOutcome};
use mani_offline::fetch::FetchRequest;
use mani_offline::message::ClientMessage;
use mani_offline::strategy::ResponseSource;

use super::support::{content_api, controller, controller_with, ORIGIN, VERSION};

#[tokio::test]
async fn test_new_generation_waits_for_last_client_to_close() {
    let fetcher = content_api();
    let (controller, storage) = controller(fetcher);
    controller.ensure_installed().await;
    let first = controller.register_client("/");
    let second = controller.register_client("/noticia/1");

    controller
        .handle(ControllerEvent::Install {
            version: Some("mani-news-v2.0.0".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(controller.lifecycle().active_generation().as_deref(), Some(VERSION));
    assert_eq!(
        controller.lifecycle().waiting_generation().as_deref(),
        Some("mani-news-v2.0.0")
    );

    assert!(controller.unregister_client(&first.id).await.unwrap().is_none());
    let activated = controller.unregister_client(&second.id).await.unwrap().unwrap();
    assert_eq!(activated.active, "mani-news-v2.0.0");
    assert_eq!(
        storage.list_generations().await.unwrap(),
        vec!["mani-news-v2.0.0".to_string()]
    );
}

#[tokio::test]
async fn test_skip_waiting_message_activates_waiting_generation() {
    let fetcher = content_api();
    let (controller, _) = controller(fetcher);
    controller.ensure_installed().await;
    controller.register_client("/");

    controller
        .handle(ControllerEvent::Install {
            version: Some("mani-news-v2.0.0".to_string()),
        })
        .await
        .unwrap();

    let outcome = controller
        .handle(ControllerEvent::Message {
            message: ClientMessage::SkipWaiting,
            client_id: None,
            reply: None,
        })
        .await
        .unwrap();
    match outcome {
        EventOutcome::Activated { report } => {
            assert_eq!(report.unwrap().active, "mani-news-v2.0.0")
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_upgrade_keeps_previous_generation_serving() {
    let fetcher = content_api();
    let (controller, storage) = controller(fetcher.clone());
    controller.ensure_installed().await;

    fetcher.fail_route("/js/main.js");
    let result = controller
        .handle(ControllerEvent::Install {
            version: Some("mani-news-v2.0.0".to_string()),
        })
        .await;
    assert!(result.is_err());
    assert_eq!(controller.lifecycle().active_generation().as_deref(), Some(VERSION));
    assert_eq!(
        storage.list_generations().await.unwrap(),
        vec![VERSION.to_string()]
    );

    fetcher.set_online(false);
    let served = controller
        .fetch(&FetchRequest::get("/css/output.css"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(served.source, ResponseSource::Cache);
}

#[tokio::test]
async fn test_quota_exceeded_keeps_only_newest_generation() {
    let storage = Arc::new(MemoryCacheStorage::default());
    for generation in ["mani-news-v0.8.0", "mani-news-v0.9.0"] {
        storage
            .put(
                generation,
                RequestKey::get("/"),
                CachedResponse::new(200, vec![], Bytes::from_static(b"old")),
            )
            .await
            .unwrap();
    }
    let controller = controller_with(ControllerConfig::new(ORIGIN), storage.clone(), content_api());

    let outcome = controller.handle(ControllerEvent::QuotaExceeded).await.unwrap();
    assert_eq!(
        outcome,
        EventOutcome::Reclaimed {
            deleted: vec!["mani-news-v0.8.0".to_string()]
        }
    );
    assert_eq!(
        storage.list_generations().await.unwrap(),
        vec!["mani-news-v0.9.0".to_string()]
    );
}

#[tokio::test]
async fn test_disk_generation_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cache_config = CacheConfig {
        backend: CacheBackend::Disk,
        cache_dir: dir.path().to_string_lossy().to_string(),
        ..Default::default()
    };

    let fetcher = content_api();
    {
        let storage = Arc::new(DiskCacheStorage::new(&cache_config));
        let controller = controller_with(ControllerConfig::new(ORIGIN), storage, fetcher.clone());
        controller.ensure_installed().await;
    }

    fetcher.reset_calls();
    fetcher.set_online(false);

    let storage = Arc::new(DiskCacheStorage::new(&cache_config));
    let controller = controller_with(ControllerConfig::new(ORIGIN), storage, fetcher.clone());
    let response = controller
        .fetch(&FetchRequest::get("/js/main.js"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response.source, ResponseSource::Cache);
    assert_eq!(response.response.body, Bytes::from_static(b"asset /js/main.js"));
    assert_eq!(fetcher.total_calls(), 0);
    assert_eq!(controller.lifecycle().active_generation().as_deref(), Some(VERSION));
}

#[test]
fn test_status_snapshot_outside_async_context() {
    let (controller, _) = controller(content_api());
    let status = tokio_test::block_on(async {
        controller.ensure_installed().await;
        controller.register_client("/");
        controller.status().await
    });

    assert_eq!(status.version, VERSION);
    assert_eq!(status.lifecycle.active.as_deref(), Some(VERSION));
    assert_eq!(status.clients.len(), 1);
    assert!(status.pending_sync.is_empty());
}
