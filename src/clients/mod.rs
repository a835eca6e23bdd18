//! Connected client views
//!
//! Each registered view has a bounded message queue that the HTTP surface drains.
//! Broadcasts also go out on a tokio broadcast channel for in-process subscribers.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::message::ClientMessage;
use crate::metrics::ControllerMetrics;

/// Oldest messages are dropped beyond this many queued per view
const MAX_QUEUED_MESSAGES: usize = 64;
const BROADCAST_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientView {
    pub id: String,
    pub url: String,
    pub focused: bool,
    pub registered_at: DateTime<Utc>,
}

struct ClientEntry {
    view: ClientView,
    queue: VecDeque<ClientMessage>,
}

pub struct ClientRegistry {
    clients: RwLock<Vec<ClientEntry>>,
    sender: broadcast::Sender<ClientMessage>,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            clients: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Register a view showing `url`; returns its id
    pub fn register(&self, url: &str) -> ClientView {
        let view = ClientView {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            focused: false,
            registered_at: Utc::now(),
        };
        let mut clients = self.clients.write();
        clients.push(ClientEntry {
            view: view.clone(),
            queue: VecDeque::new(),
        });
        ControllerMetrics::global()
            .connected_clients
            .set(clients.len() as i64);
        tracing::debug!(client_id = %view.id, url = %url, "Client view registered");
        view
    }

    pub fn unregister(&self, id: &str) -> bool {
        let mut clients = self.clients.write();
        let before = clients.len();
        clients.retain(|c| c.view.id != id);
        ControllerMetrics::global()
            .connected_clients
            .set(clients.len() as i64);
        clients.len() != before
    }

    pub fn get(&self, id: &str) -> Option<ClientView> {
        self.clients
            .read()
            .iter()
            .find(|c| c.view.id == id)
            .map(|c| c.view.clone())
    }

    pub fn list(&self) -> Vec<ClientView> {
        self.clients.read().iter().map(|c| c.view.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Queue a message for one view; false when the view is unknown
    pub fn post(&self, id: &str, message: ClientMessage) -> bool {
        let mut clients = self.clients.write();
        match clients.iter_mut().find(|c| c.view.id == id) {
            Some(entry) => {
                push_bounded(&mut entry.queue, message);
                true
            }
            None => false,
        }
    }

    /// Queue a message for every view; returns how many views received it
    pub fn broadcast(&self, message: ClientMessage) -> usize {
        let delivered = {
            let mut clients = self.clients.write();
            for entry in clients.iter_mut() {
                push_bounded(&mut entry.queue, message.clone());
            }
            clients.len()
        };
        // No in-process subscribers is fine
        let _ = self.sender.send(message);
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
        self.sender.subscribe()
    }

    /// Take every queued message of a view; None when the view is unknown
    pub fn drain(&self, id: &str) -> Option<Vec<ClientMessage>> {
        let mut clients = self.clients.write();
        clients
            .iter_mut()
            .find(|c| c.view.id == id)
            .map(|c| c.queue.drain(..).collect())
    }

    pub fn find_by_url(&self, url: &str) -> Option<ClientView> {
        self.clients
            .read()
            .iter()
            .find(|c| c.view.url == url)
            .map(|c| c.view.clone())
    }

    /// Give focus to one view; false when the view is unknown
    pub fn focus(&self, id: &str) -> bool {
        let mut clients = self.clients.write();
        if !clients.iter().any(|c| c.view.id == id) {
            return false;
        }
        for entry in clients.iter_mut() {
            entry.view.focused = entry.view.id == id;
        }
        true
    }

    /// Open a new focused view at `url`
    pub fn open_window(&self, url: &str) -> ClientView {
        let view = self.register(url);
        self.focus(&view.id);
        ClientView {
            focused: true,
            ..view
        }
    }
}

fn push_bounded(queue: &mut VecDeque<ClientMessage>, message: ClientMessage) {
    if queue.len() >= MAX_QUEUED_MESSAGES {
        queue.pop_front();
    }
    queue.push_back(message);
}
