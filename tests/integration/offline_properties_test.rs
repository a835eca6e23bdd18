// Observable guarantees of the controller, driven through the public API with an
// in-memory content API and in-memory storage

use bytes::Bytes;
use std::sync::Arc;

use mani_offline::cache::{CacheConfig, CacheError, CacheStorage, MemoryCacheStorage, RequestKey};
use mani_offline::config::ControllerConfig;
use mani_offline::controller::{ControllerEvent, EventOutcome};
use mani_offline::error::ControllerError;
use mani_offline::fetch::{FetchError, FetchRequest};
use mani_offline::message::ClientMessage;
use mani_offline::router::{ClassificationRule, Strategy};
use mani_offline::strategy::ResponseSource;

use super::support::{content_api, controller, controller_with, ORIGIN, VERSION};

#[tokio::test]
async fn test_cache_first_second_request_skips_network() {
    let fetcher = content_api();
    fetcher.set_route("/css/site.css", "text/css", "body{}");
    let (controller, _) = controller(fetcher.clone());

    let first = controller
        .fetch(&FetchRequest::get("/css/site.css"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.source, ResponseSource::Network);
    assert_eq!(fetcher.call_count("/css/site.css"), 1);

    let second = controller
        .fetch(&FetchRequest::get("/css/site.css"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.source, ResponseSource::Cache);
    assert_eq!(second.response.body, Bytes::from_static(b"body{}"));
    assert_eq!(fetcher.call_count("/css/site.css"), 1);
}

#[tokio::test]
async fn test_network_first_returns_fresh_content_when_reachable() {
    let fetcher = content_api();
    fetcher.set_route("/api/news", "application/json", r#"["old"]"#);
    let (controller, storage) = controller(fetcher.clone());

    controller
        .fetch(&FetchRequest::get("/api/news"))
        .await
        .unwrap()
        .unwrap();
    fetcher.set_route("/api/news", "application/json", r#"["new"]"#);

    let fresh = controller
        .fetch(&FetchRequest::get("/api/news"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.source, ResponseSource::Network);
    assert_eq!(fresh.response.body, Bytes::from_static(br#"["new"]"#));

    let stored = storage
        .get(VERSION, &RequestKey::get("/api/news"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.body, Bytes::from_static(br#"["new"]"#));

    fetcher.set_online(false);
    let stale = controller
        .fetch(&FetchRequest::get("/api/news"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stale.source, ResponseSource::Cache);
    assert_eq!(stale.response.body, Bytes::from_static(br#"["new"]"#));
}

#[tokio::test]
async fn test_offline_image_miss_returns_fallback_image() {
    let fetcher = content_api();
    let (controller, _) = controller(fetcher.clone());
    controller.ensure_installed().await;
    fetcher.set_online(false);

    let response = controller
        .fetch(&FetchRequest::image("/images/never-seen.jpg"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.source, ResponseSource::FallbackImage);
    assert_eq!(
        response.response.body,
        Bytes::from_static(b"asset /images/placeholder.jpg")
    );
}

#[tokio::test]
async fn test_offline_navigation_gets_offline_page() {
    let fetcher = content_api();
    let (controller, _) = controller(fetcher.clone());
    controller.ensure_installed().await;
    fetcher.set_online(false);

    let response = controller
        .fetch(&FetchRequest::navigate("/noticia/123"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.source, ResponseSource::OfflinePage);
    assert_eq!(
        response.response.body,
        Bytes::from_static(b"asset /offline.html")
    );
}

#[tokio::test]
async fn test_activation_leaves_no_entries_from_prior_generations() {
    let fetcher = content_api();
    let (controller, storage) = controller(fetcher);

    controller
        .handle(ControllerEvent::Install {
            version: Some("mani-news-v1.0.0".to_string()),
        })
        .await
        .unwrap();
    let outcome = controller
        .handle(ControllerEvent::Install {
            version: Some("mani-news-v1.1.0".to_string()),
        })
        .await
        .unwrap();

    match outcome {
        EventOutcome::Installed { report } => {
            let activation = report.activated.unwrap();
            assert_eq!(activation.active, "mani-news-v1.1.0");
            assert_eq!(activation.deleted, vec!["mani-news-v1.0.0".to_string()]);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert_eq!(
        storage.list_generations().await.unwrap(),
        vec!["mani-news-v1.1.0".to_string()]
    );
    assert!(storage.keys("mani-news-v1.0.0").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_push_payload_defaults_and_url() {
    let (controller, _) = controller(content_api());

    let empty = controller
        .handle(ControllerEvent::Push {
            data: Some(Bytes::from_static(b"{}")),
        })
        .await
        .unwrap();
    let EventOutcome::Notified { notification } = empty else {
        panic!("expected a notification");
    };
    assert_eq!(notification.body, "Nova notícia importante disponível!");
    assert_eq!(notification.title, "Mani News");
    assert_eq!(notification.data.url, "/");

    let custom = controller
        .handle(ControllerEvent::Push {
            data: Some(Bytes::from_static(br#"{"body":"X","url":"/y"}"#)),
        })
        .await
        .unwrap();
    let EventOutcome::Notified { notification } = custom else {
        panic!("expected a notification");
    };
    assert_eq!(notification.body, "X");
    assert_eq!(notification.data.url, "/y");
}

#[tokio::test]
async fn test_cache_urls_adds_exactly_the_requested_entries() {
    let fetcher = content_api();
    fetcher.set_route("/a", "text/plain", "a");
    fetcher.set_route("/b", "text/plain", "b");
    let (controller, storage) = controller(fetcher);
    controller.ensure_installed().await;
    let before = storage.keys(VERSION).await.unwrap();

    let outcome = controller
        .handle(ControllerEvent::Message {
            message: ClientMessage::CacheUrls {
                urls: vec!["/a".to_string(), "/b".to_string()],
            },
            client_id: None,
            reply: None,
        })
        .await
        .unwrap();
    assert_eq!(outcome, EventOutcome::Cached { urls: 2 });

    let after = storage.keys(VERSION).await.unwrap();
    assert_eq!(after.len(), before.len() + 2);
    for url in ["/a", "/b"] {
        assert!(storage
            .get(VERSION, &RequestKey::get(url))
            .await
            .unwrap()
            .is_some());
    }
}

#[tokio::test]
async fn test_cache_urls_is_all_or_nothing() {
    let fetcher = content_api();
    fetcher.set_route("/a", "text/plain", "a");
    let (controller, storage) = controller(fetcher);
    controller.ensure_installed().await;
    let before = storage.keys(VERSION).await.unwrap();

    let result = controller
        .handle(ControllerEvent::Message {
            message: ClientMessage::CacheUrls {
                urls: vec!["/a".to_string(), "/missing".to_string()],
            },
            client_id: None,
            reply: None,
        })
        .await;
    assert!(matches!(
        result,
        Err(ControllerError::Network(FetchError::Status { status: 404, .. }))
    ));
    assert_eq!(storage.keys(VERSION).await.unwrap(), before);
}

#[tokio::test]
async fn test_cache_urls_rolls_back_when_a_write_fails() {
    let fetcher = content_api();
    fetcher.set_route("/a", "text/plain", "a");
    fetcher.set_route("/b", "text/plain", Bytes::from(vec![0u8; 2 * 1024 * 1024]));
    let storage = Arc::new(MemoryCacheStorage::new(&CacheConfig {
        max_item_size_mb: 1,
        ..Default::default()
    }));
    let controller = controller_with(ControllerConfig::new(ORIGIN), storage.clone(), fetcher);
    controller.ensure_installed().await;
    let before = storage.keys(VERSION).await.unwrap();

    let result = controller
        .handle(ControllerEvent::Message {
            message: ClientMessage::CacheUrls {
                urls: vec!["/a".to_string(), "/b".to_string()],
            },
            client_id: None,
            reply: None,
        })
        .await;
    assert!(matches!(
        result,
        Err(ControllerError::Cache(CacheError::EntryTooLarge { .. }))
    ));
    assert_eq!(storage.keys(VERSION).await.unwrap(), before);
    assert!(storage
        .get(VERSION, &RequestKey::get("/a"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_offline_image_without_fallback_propagates_error() {
    let fetcher = content_api();
    let mut config = ControllerConfig::new(ORIGIN);
    config.rules = vec![
        ClassificationRule::new("/api/", Strategy::NetworkFirst),
        ClassificationRule::new("/images/", Strategy::CacheFirst),
    ];
    config.precache = Vec::new();
    let controller = controller_with(
        config,
        Arc::new(MemoryCacheStorage::default()),
        fetcher.clone(),
    );
    controller.ensure_installed().await;
    fetcher.set_online(false);

    let err = controller
        .fetch(&FetchRequest::image("/images/logo.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::Network(FetchError::Network { .. })));
    assert_eq!(err.status_code(), 502);
}

#[tokio::test]
async fn test_cross_origin_and_mutating_requests_bypass() {
    let fetcher = content_api();
    let (controller, _) = controller(fetcher.clone());

    let cross = controller
        .fetch(&FetchRequest::image("https://cdn.example.com/images/a.png"))
        .await
        .unwrap();
    assert!(cross.is_none());

    let post = controller
        .fetch(&FetchRequest::get("/api/comments").with_method(http::Method::POST))
        .await
        .unwrap();
    assert!(post.is_none());
    assert_eq!(fetcher.total_calls(), 0);
}
