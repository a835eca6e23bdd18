//! Push messages and notification clicks

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clients::{ClientRegistry, ClientView};
use crate::constants::{
    DEFAULT_PUSH_BODY, DEFAULT_PUSH_TITLE, DEFAULT_PUSH_URL, NOTIFICATION_BADGE,
    NOTIFICATION_DISPLAY_TITLE, NOTIFICATION_ICON, NOTIFICATION_IMAGE, NOTIFICATION_TAG,
    NOTIFICATION_VIBRATE,
};

/// Push payload with defaults filled in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushPayload {
    pub body: String,
    pub url: String,
    pub title: String,
}

impl Default for PushPayload {
    fn default() -> Self {
        Self {
            body: DEFAULT_PUSH_BODY.to_string(),
            url: DEFAULT_PUSH_URL.to_string(),
            title: DEFAULT_PUSH_TITLE.to_string(),
        }
    }
}

impl PushPayload {
    /// Parse push data; missing, empty, or malformed fields fall back to defaults
    pub fn parse(data: Option<&[u8]>) -> Self {
        let Some(data) = data.filter(|d| !d.is_empty()) else {
            return Self::default();
        };
        let value: Value = match serde_json::from_slice(data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed push payload, using defaults");
                return Self::default();
            }
        };

        let field = |name: &str, default: &str| -> String {
            value
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        Self {
            body: field("body", DEFAULT_PUSH_BODY),
            url: field("url", DEFAULT_PUSH_URL),
            title: field("title", DEFAULT_PUSH_TITLE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// Milliseconds since the Unix epoch
    pub date_of_arrival: i64,
    pub primary_key: u32,
    pub url: String,
    pub title: String,
}

/// A notification as presented to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub image: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
    pub tag: String,
    pub require_interaction: bool,
}

impl Notification {
    pub fn from_payload(payload: &PushPayload) -> Self {
        Self {
            title: NOTIFICATION_DISPLAY_TITLE.to_string(),
            body: payload.body.clone(),
            icon: NOTIFICATION_ICON.to_string(),
            badge: NOTIFICATION_BADGE.to_string(),
            image: NOTIFICATION_IMAGE.to_string(),
            vibrate: NOTIFICATION_VIBRATE.to_vec(),
            data: NotificationData {
                date_of_arrival: Utc::now().timestamp_millis(),
                primary_key: 1,
                url: payload.url.clone(),
                title: payload.title.clone(),
            },
            actions: vec![
                NotificationAction {
                    action: "explore".to_string(),
                    title: "Ver Notícia".to_string(),
                    icon: "/icons/action-explore.png".to_string(),
                },
                NotificationAction {
                    action: "close".to_string(),
                    title: "Fechar".to_string(),
                    icon: "/icons/action-close.png".to_string(),
                },
            ],
            tag: NOTIFICATION_TAG.to_string(),
            require_interaction: true,
        }
    }
}

/// Notifications currently shown; a new notification replaces one with the same tag
#[derive(Debug, Default)]
pub struct NotificationCenter {
    shown: RwLock<Vec<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, notification: Notification) {
        let mut shown = self.shown.write();
        shown.retain(|n| n.tag != notification.tag);
        tracing::info!(
            tag = %notification.tag,
            url = %notification.data.url,
            "Showing notification"
        );
        shown.push(notification);
    }

    /// Close notifications with `tag`; returns how many were closed
    pub fn close(&self, tag: &str) -> usize {
        let mut shown = self.shown.write();
        let before = shown.len();
        shown.retain(|n| n.tag != tag);
        before - shown.len()
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown.read().clone()
    }
}

/// Which part of a notification was clicked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    Explore,
    Close,
    /// The notification body or an unknown action
    Default,
}

impl ClickAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "explore" => ClickAction::Explore,
            "close" => ClickAction::Close,
            _ => ClickAction::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClickAction::Explore => "explore",
            ClickAction::Close => "close",
            ClickAction::Default => "default",
        }
    }
}

/// What a click did to the client views
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ClientAction {
    Opened { client: ClientView },
    Focused { client: ClientView },
    Dismissed,
}

/// Apply a notification click
///
/// The notification is always closed. `explore` opens the notification's URL in a
/// new view, `close` does nothing else, and any other action focuses a view at `/`
/// or opens one there.
pub fn handle_click(
    clients: &ClientRegistry,
    center: &NotificationCenter,
    action: &ClickAction,
    url: Option<&str>,
) -> ClientAction {
    center.close(NOTIFICATION_TAG);

    match action {
        ClickAction::Explore => {
            let target = url.filter(|u| !u.is_empty()).unwrap_or(DEFAULT_PUSH_URL);
            ClientAction::Opened {
                client: clients.open_window(target),
            }
        }
        ClickAction::Close => ClientAction::Dismissed,
        ClickAction::Default => match clients.find_by_url("/") {
            Some(existing) => {
                clients.focus(&existing.id);
                ClientAction::Focused {
                    client: ClientView {
                        focused: true,
                        ..existing
                    },
                }
            }
            None => ClientAction::Opened {
                client: clients.open_window("/"),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_empty_object_uses_defaults() {
        let payload = PushPayload::parse(Some(b"{}"));
        assert_eq!(payload.body, "Nova notícia importante disponível!");
        assert_eq!(payload.url, "/");
        assert_eq!(payload.title, "Nova Notícia");
    }

    #[test]
    fn test_payload_fields_are_kept() {
        let payload = PushPayload::parse(Some(br#"{"body":"X","url":"/y"}"#));
        assert_eq!(payload.body, "X");
        assert_eq!(payload.url, "/y");
        assert_eq!(payload.title, "Nova Notícia");

        let notification = Notification::from_payload(&payload);
        assert_eq!(notification.data.url, "/y");
        assert_eq!(notification.title, "Mani News");
    }

    #[rstest]
    #[case(None)]
    #[case(Some(&b""[..]))]
    #[case(Some(&b"not json"[..]))]
    #[case(Some(&b"[1,2,3]"[..]))]
    #[case(Some(&br#"{"body":42,"url":""}"#[..]))]
    fn test_malformed_payloads_fall_back_to_defaults(#[case] data: Option<&[u8]>) {
        assert_eq!(PushPayload::parse(data), PushPayload::default());
    }

    #[test]
    fn test_notification_presentation() {
        let notification = Notification::from_payload(&PushPayload::default());
        assert_eq!(notification.vibrate, vec![100, 50, 100]);
        assert_eq!(notification.tag, "news-notification");
        assert!(notification.require_interaction);
        assert_eq!(notification.data.primary_key, 1);
        let actions: Vec<&str> = notification
            .actions
            .iter()
            .map(|a| a.action.as_str())
            .collect();
        assert_eq!(actions, vec!["explore", "close"]);

        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["requireInteraction"], true);
        assert!(json["data"]["dateOfArrival"].is_i64());
    }

    #[test]
    fn test_same_tag_replaces_shown_notification() {
        let center = NotificationCenter::new();
        center.show(Notification::from_payload(&PushPayload::default()));
        center.show(Notification::from_payload(&PushPayload::parse(Some(
            br#"{"body":"second"}"#,
        ))));
        let shown = center.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].body, "second");
    }

    #[test]
    fn test_explore_opens_target_url() {
        let clients = ClientRegistry::new();
        let center = NotificationCenter::new();
        center.show(Notification::from_payload(&PushPayload::default()));

        let result = handle_click(&clients, &center, &ClickAction::Explore, Some("/noticia/7"));
        match result {
            ClientAction::Opened { client } => {
                assert_eq!(client.url, "/noticia/7");
                assert!(client.focused);
            }
            other => panic!("unexpected click result: {:?}", other),
        }
        assert!(center.shown().is_empty());
    }

    #[test]
    fn test_close_only_dismisses() {
        let clients = ClientRegistry::new();
        let center = NotificationCenter::new();
        let result = handle_click(&clients, &center, &ClickAction::parse("close"), Some("/x"));
        assert_eq!(result, ClientAction::Dismissed);
        assert!(clients.is_empty());
    }

    #[test]
    fn test_default_action_focuses_root_view() {
        let clients = ClientRegistry::new();
        let center = NotificationCenter::new();
        let root = clients.register("/");
        clients.register("/noticia/1");

        match handle_click(&clients, &center, &ClickAction::parse(""), None) {
            ClientAction::Focused { client } => assert_eq!(client.id, root.id),
            other => panic!("unexpected click result: {:?}", other),
        }
        assert_eq!(clients.len(), 2);
    }

    #[test]
    fn test_default_action_opens_root_when_absent() {
        let clients = ClientRegistry::new();
        let center = NotificationCenter::new();
        match handle_click(&clients, &center, &ClickAction::parse("unknown"), Some("/ignored")) {
            ClientAction::Opened { client } => assert_eq!(client.url, "/"),
            other => panic!("unexpected click result: {:?}", other),
        }
    }
}
