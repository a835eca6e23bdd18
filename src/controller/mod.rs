//! Offline request cache controller
//!
//! `OfflineController` owns the classifier, the lifecycle, and the registries, and
//! routes every `ControllerEvent` to the matching handler. The HTTP surface and the
//! tests both drive it through `handle` or the thin helpers below.

use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{oneshot, OnceCell};

use crate::cache::{CacheStats, CacheStorage};
use crate::clients::{ClientRegistry, ClientView};
use crate::config::ControllerConfig;
use crate::constants::NEWS_UPDATED_DATA;
use crate::error::ControllerError;
use crate::fetch::{normalize_origin, FetchRequest, Fetcher};
use crate::lifecycle::{
    fetch_all, write_entries, ActivationReport, InstallReport, Lifecycle, LifecycleStatus,
};
use crate::message::{ClientMessage, VersionReply};
use crate::metrics::ControllerMetrics;
use crate::notification::{
    handle_click, ClickAction, ClientAction, Notification, NotificationCenter, PushPayload,
};
use crate::router::{Classification, Router};
use crate::strategy::{cache_first, network_first, StrategyContext, StrategyResponse};
use crate::sync::{self, PendingSyncTask, SyncOutcome, SyncRegistry};

/// Everything the controller reacts to
#[derive(Debug)]
pub enum ControllerEvent {
    /// Install a generation; None installs the configured version
    Install { version: Option<String> },
    Activate,
    Fetch(FetchRequest),
    Sync { tag: String },
    PeriodicSync { tag: String },
    Push { data: Option<Bytes> },
    NotificationClick { action: String, url: Option<String> },
    Message {
        message: ClientMessage,
        client_id: Option<String>,
        /// Receives the `GET_VERSION` reply
        reply: Option<oneshot::Sender<VersionReply>>,
    },
    QuotaExceeded,
}

impl ControllerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ControllerEvent::Install { .. } => "install",
            ControllerEvent::Activate => "activate",
            ControllerEvent::Fetch(_) => "fetch",
            ControllerEvent::Sync { .. } => "sync",
            ControllerEvent::PeriodicSync { .. } => "periodic_sync",
            ControllerEvent::Push { .. } => "push",
            ControllerEvent::NotificationClick { .. } => "notification_click",
            ControllerEvent::Message { .. } => "message",
            ControllerEvent::QuotaExceeded => "quota_exceeded",
        }
    }
}

/// Result of handling one event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    Installed { report: InstallReport },
    Activated { report: Option<ActivationReport> },
    /// A classified fetch answered by a strategy
    #[serde(skip)]
    Response(StrategyResponse),
    /// The fetch is not handled by the controller
    Bypass,
    Synced { result: SyncOutcome },
    Notified { notification: Notification },
    Clicked { action: ClientAction },
    Version { reply: VersionReply },
    Cached { urls: usize },
    Broadcast { delivered: usize },
    Reclaimed { deleted: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub version: String,
    pub lifecycle: LifecycleStatus,
    pub pending_sync: Vec<PendingSyncTask>,
    pub clients: Vec<ClientView>,
    /// Stats of the active generation
    pub cache: Option<CacheStats>,
}

pub struct OfflineController {
    config: Arc<ControllerConfig>,
    router: Router,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    lifecycle: Lifecycle,
    sync: SyncRegistry,
    clients: ClientRegistry,
    notifications: NotificationCenter,
    bootstrapped: OnceCell<()>,
}

impl OfflineController {
    pub fn new(
        config: Arc<ControllerConfig>,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let router = Router::new(&config.origin, config.rules.clone());
        let lifecycle = Lifecycle::new(storage.clone(), fetcher.clone());
        Self {
            config,
            router,
            storage,
            fetcher,
            lifecycle,
            sync: SyncRegistry::new(),
            clients: ClientRegistry::new(),
            notifications: NotificationCenter::new(),
            bootstrapped: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn sync_registry(&self) -> &SyncRegistry {
        &self.sync
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Bring up the configured generation once per process
    ///
    /// A generation already present in storage (left by an earlier run) is adopted;
    /// otherwise the configured version is installed. When that install fails the
    /// most recent stored generation, if any, keeps serving.
    pub async fn ensure_installed(&self) {
        self.bootstrapped
            .get_or_init(|| async {
                let version = self.config.version.clone();
                let existing = match self.storage.list_generations().await {
                    Ok(generations) => generations,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to list stored generations");
                        Vec::new()
                    }
                };

                if existing.contains(&version) {
                    if let Err(e) = self.lifecycle.adopt_existing(&version).await {
                        tracing::error!(version = %version, error = %e, "Failed to adopt stored generation");
                    }
                    return;
                }

                if let Err(e) = self.install(None).await {
                    tracing::error!(version = %version, error = %e, "Initial install failed");
                    if let Err(e) = self.lifecycle.adopt_existing(&version).await {
                        tracing::error!(error = %e, "Failed to adopt stored generation");
                    }
                }
            })
            .await;
    }

    /// Route one event to its handler
    pub async fn handle(&self, event: ControllerEvent) -> Result<EventOutcome, ControllerError> {
        tracing::debug!(event = event.name(), "Handling controller event");
        match event {
            ControllerEvent::Install { version } => {
                let report = self.install(version.as_deref()).await?;
                Ok(EventOutcome::Installed { report })
            }
            ControllerEvent::Activate => Ok(EventOutcome::Activated {
                report: self.lifecycle.activate().await?,
            }),
            ControllerEvent::Fetch(request) => Ok(match self.fetch(&request).await? {
                Some(response) => EventOutcome::Response(response),
                None => EventOutcome::Bypass,
            }),
            ControllerEvent::Sync { tag } => Ok(EventOutcome::Synced {
                result: self.run_sync(&tag, false).await,
            }),
            ControllerEvent::PeriodicSync { tag } => Ok(EventOutcome::Synced {
                result: self.run_sync(&tag, true).await,
            }),
            ControllerEvent::Push { data } => Ok(EventOutcome::Notified {
                notification: self.push(data.as_deref()),
            }),
            ControllerEvent::NotificationClick { action, url } => Ok(EventOutcome::Clicked {
                action: self.notification_click(&action, url.as_deref()),
            }),
            ControllerEvent::Message {
                message,
                client_id,
                reply,
            } => self.message(message, client_id.as_deref(), reply).await,
            ControllerEvent::QuotaExceeded => Ok(EventOutcome::Reclaimed {
                deleted: self.lifecycle.reclaim_for_quota().await?,
            }),
        }
    }

    async fn install(&self, version: Option<&str>) -> Result<InstallReport, ControllerError> {
        let version = version.unwrap_or(&self.config.version);
        let mut report = self.lifecycle.install(version, &self.config.precache).await?;
        if self.config.skip_waiting_on_install && report.activated.is_none() {
            report.activated = self.lifecycle.skip_waiting().await?;
        }
        Ok(report)
    }

    fn strategy_context<'a>(&'a self, generation: Option<&'a str>) -> StrategyContext<'a> {
        StrategyContext {
            storage: self.storage.as_ref(),
            fetcher: self.fetcher.as_ref(),
            generation,
            fallback_image: &self.config.fallback_image,
            offline_url: &self.config.offline_url,
            quota: Some(&self.lifecycle),
        }
    }

    /// Classify and answer a request; None when the request bypasses the controller
    pub async fn fetch(
        &self,
        request: &FetchRequest,
    ) -> Result<Option<StrategyResponse>, ControllerError> {
        let classification = self.router.classify(request);
        let metrics = ControllerMetrics::global();
        metrics
            .classifications
            .with_label_values(&[classification.as_str()])
            .inc();

        if classification == Classification::Bypass {
            return Ok(None);
        }

        self.ensure_installed().await;
        let _timer = metrics.start_request_timer(classification.as_str());
        let generation = self.lifecycle.active_generation();
        let ctx = self.strategy_context(generation.as_deref());

        let response = if classification == Classification::CacheFirst {
            cache_first(&ctx, request).await?
        } else {
            network_first(&ctx, request).await?
        };

        tracing::debug!(
            url = %request.url,
            classification = classification.as_str(),
            source = response.source.as_str(),
            status = response.response.status,
            "Request served"
        );
        Ok(Some(response))
    }

    /// Register a deferred task; false when one with the same tag is pending
    pub fn register_sync(&self, tag: &str) -> bool {
        self.sync.register(tag)
    }

    async fn run_sync(&self, tag: &str, periodic: bool) -> SyncOutcome {
        let metrics = ControllerMetrics::global();
        let task = match self.config.sync_task(tag) {
            Some(task) if task.periodic == periodic => task,
            _ => {
                tracing::debug!(tag = %tag, periodic = periodic, "No sync task for tag");
                let outcome = SyncOutcome::Ignored {
                    tag: tag.to_string(),
                };
                metrics
                    .sync_runs
                    .with_label_values(&[tag, outcome.label()])
                    .inc();
                return outcome;
            }
        };

        self.ensure_installed().await;
        let generation = self.lifecycle.active_generation();
        let ctx = self.strategy_context(generation.as_deref());

        let outcome = match sync::refresh(&ctx, &task.refresh_url).await {
            Ok(()) => {
                if !periodic {
                    self.sync.complete(tag);
                }
                let delivered = self.clients.broadcast(ClientMessage::NewsUpdated {
                    data: NEWS_UPDATED_DATA.to_string(),
                });
                tracing::info!(tag = %tag, clients = delivered, "Sync completed");
                SyncOutcome::Completed {
                    tag: tag.to_string(),
                }
            }
            Err(e) => {
                let reason = e.to_string();
                if !periodic {
                    self.sync.record_failure(tag, &reason);
                }
                tracing::warn!(tag = %tag, error = %reason, "Sync failed, task stays pending");
                SyncOutcome::Failed {
                    tag: tag.to_string(),
                    reason,
                }
            }
        };

        metrics
            .sync_runs
            .with_label_values(&[tag, outcome.label()])
            .inc();
        outcome
    }

    fn push(&self, data: Option<&[u8]>) -> Notification {
        let payload = PushPayload::parse(data);
        let notification = Notification::from_payload(&payload);
        self.notifications.show(notification.clone());
        ControllerMetrics::global().push_notifications.inc();
        notification
    }

    fn notification_click(&self, action: &str, url: Option<&str>) -> ClientAction {
        let action = ClickAction::parse(action);
        ControllerMetrics::global()
            .notification_clicks
            .with_label_values(&[action.as_str()])
            .inc();

        let result = handle_click(&self.clients, &self.notifications, &action, url);
        if let ClientAction::Opened { client } = &result {
            self.lifecycle.attach_consumer();
            tracing::info!(client_id = %client.id, url = %client.url, "Opened client view");
        }
        result
    }

    async fn message(
        &self,
        message: ClientMessage,
        client_id: Option<&str>,
        reply: Option<oneshot::Sender<VersionReply>>,
    ) -> Result<EventOutcome, ControllerError> {
        ControllerMetrics::global()
            .messages
            .with_label_values(&[message.kind()])
            .inc();
        tracing::info!(
            message_type = message.kind(),
            client_id = client_id.unwrap_or("-"),
            "Message received"
        );

        match message {
            ClientMessage::SkipWaiting => Ok(EventOutcome::Activated {
                report: self.lifecycle.skip_waiting().await?,
            }),
            ClientMessage::GetVersion => {
                let reply_body = VersionReply {
                    version: self
                        .lifecycle
                        .active_generation()
                        .unwrap_or_else(|| self.config.version.clone()),
                };
                if let Some(reply) = reply {
                    // The requester may have gone away
                    let _ = reply.send(reply_body.clone());
                }
                Ok(EventOutcome::Version { reply: reply_body })
            }
            ClientMessage::CacheUrls { urls } => {
                let cached = self.cache_urls(&urls).await?;
                Ok(EventOutcome::Cached { urls: cached })
            }
            ClientMessage::NewsUpdated { data } => Ok(EventOutcome::Broadcast {
                delivered: self.clients.broadcast(ClientMessage::NewsUpdated { data }),
            }),
        }
    }

    /// Fetch and store exactly `urls` in the active generation, all or nothing
    async fn cache_urls(&self, urls: &[String]) -> Result<usize, ControllerError> {
        let own_origin = normalize_origin(&self.config.origin);
        for url in urls {
            let request = FetchRequest::get(url.as_str());
            let same_origin = request
                .origin()
                .map(|o| normalize_origin(o) == own_origin)
                .unwrap_or(true);
            if !same_origin || !request.path_and_query().starts_with('/') {
                return Err(ControllerError::InvalidMessage(format!(
                    "CACHE_URLS entry '{}' is not a same-origin path",
                    url
                )));
            }
        }

        self.ensure_installed().await;
        let generation = self
            .lifecycle
            .active_generation()
            .ok_or(ControllerError::NoActiveGeneration)?;

        let entries = fetch_all(self.fetcher.as_ref(), urls).await?;
        let count = entries.len();
        write_entries(self.storage.as_ref(), &generation, entries).await?;
        tracing::info!(generation = %generation, urls = count, "Cached URLs on request");
        Ok(count)
    }

    /// Register a client view; it becomes a consumer of the active generation
    pub fn register_client(&self, url: &str) -> ClientView {
        let view = self.clients.register(url);
        self.lifecycle.attach_consumer();
        view
    }

    /// Remove a client view; the last one out lets a waiting generation activate
    pub async fn unregister_client(
        &self,
        id: &str,
    ) -> Result<Option<ActivationReport>, ControllerError> {
        if !self.clients.unregister(id) {
            return Ok(None);
        }
        self.lifecycle.release_consumer().await
    }

    pub async fn status(&self) -> ControllerStatus {
        let lifecycle = self.lifecycle.status();
        let cache = match &lifecycle.active {
            Some(generation) => match self.storage.stats(generation).await {
                Ok(stats) => Some(stats),
                Err(e) => {
                    tracing::warn!(generation = %generation, error = %e, "Failed to read cache stats");
                    None
                }
            },
            None => None,
        };
        ControllerStatus {
            version: self.config.version.clone(),
            lifecycle,
            pending_sync: self.sync.pending(),
            clients: self.clients.list(),
            cache,
        }
    }
}
