//! Background sync: deferred tasks registered while offline
//!
//! A task is identified by its tag and at most one instance per tag is pending.
//! Running a task refetches its refresh URL into the active generation; a failed
//! run leaves the task pending for the next connectivity signal.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants::{NEWS_LATEST_URL, NEWS_SYNC_TAG, NEWS_UPDATE_TAG};
use crate::fetch::{FetchError, FetchRequest};
use crate::strategy::StrategyContext;

/// A sync task the controller knows how to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTaskConfig {
    pub tag: String,
    /// URL refetched into the cache when the task runs
    #[serde(default = "default_refresh_url")]
    pub refresh_url: String,
    /// Periodic tasks run on every periodic sync signal without registration
    #[serde(default)]
    pub periodic: bool,
}

fn default_refresh_url() -> String {
    NEWS_LATEST_URL.to_string()
}

/// Built-in tasks: `news-sync` (registered) and `news-update` (periodic)
pub fn default_sync_tasks() -> Vec<SyncTaskConfig> {
    vec![
        SyncTaskConfig {
            tag: NEWS_SYNC_TAG.to_string(),
            refresh_url: default_refresh_url(),
            periodic: false,
        },
        SyncTaskConfig {
            tag: NEWS_UPDATE_TAG.to_string(),
            refresh_url: default_refresh_url(),
            periodic: true,
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSyncTask {
    pub tag: String,
    pub registered_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed { tag: String },
    /// The task stays pending
    Failed { tag: String, reason: String },
    /// No task is configured for the tag
    Ignored { tag: String },
}

impl SyncOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Completed { .. } => "completed",
            SyncOutcome::Failed { .. } => "failed",
            SyncOutcome::Ignored { .. } => "ignored",
        }
    }
}

/// Pending tasks, at most one per tag
#[derive(Debug, Default)]
pub struct SyncRegistry {
    pending: RwLock<Vec<PendingSyncTask>>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task; returns false when one with the same tag is already pending
    pub fn register(&self, tag: &str) -> bool {
        let mut pending = self.pending.write();
        if pending.iter().any(|t| t.tag == tag) {
            return false;
        }
        pending.push(PendingSyncTask {
            tag: tag.to_string(),
            registered_at: Utc::now(),
            attempts: 0,
            last_error: None,
        });
        tracing::info!(tag = %tag, "Sync task registered");
        true
    }

    pub fn is_pending(&self, tag: &str) -> bool {
        self.pending.read().iter().any(|t| t.tag == tag)
    }

    pub fn pending(&self) -> Vec<PendingSyncTask> {
        self.pending.read().clone()
    }

    pub fn len(&self) -> usize {
        self.pending.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.read().is_empty()
    }

    /// Remove a finished task
    pub fn complete(&self, tag: &str) -> Option<PendingSyncTask> {
        let mut pending = self.pending.write();
        let index = pending.iter().position(|t| t.tag == tag)?;
        Some(pending.remove(index))
    }

    /// Record a failed run, registering the task if it was not pending
    pub fn record_failure(&self, tag: &str, reason: &str) {
        self.register(tag);
        let mut pending = self.pending.write();
        if let Some(task) = pending.iter_mut().find(|t| t.tag == tag) {
            task.attempts += 1;
            task.last_error = Some(reason.to_string());
        }
    }
}

/// Refetch `url` and store it in the context's generation
///
/// Fails on a network error or a non-success status; nothing is stored then.
pub async fn refresh(ctx: &StrategyContext<'_>, url: &str) -> Result<(), FetchError> {
    let request = FetchRequest::get(url);
    let response = ctx.fetcher.fetch(&request).await?;
    if !response.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status,
        });
    }
    ctx.store(request.cache_key(), &response).await;
    Ok(())
}
