//! Message protocol between client views and the controller
//!
//! Messages are JSON objects discriminated by a `type` field.

use serde::{Deserialize, Serialize};

use crate::error::ControllerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate the waiting generation without waiting for consumers
    SkipWaiting,
    /// Ask for the active generation id
    GetVersion,
    /// Fetch and store exactly these URLs in the active generation
    CacheUrls { urls: Vec<String> },
    /// Controller to views: fresh content was synced
    NewsUpdated { data: String },
}

impl ClientMessage {
    pub fn parse(bytes: &[u8]) -> Result<Self, ControllerError> {
        serde_json::from_slice(bytes).map_err(|e| ControllerError::InvalidMessage(e.to_string()))
    }

    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::SkipWaiting => "SKIP_WAITING",
            ClientMessage::GetVersion => "GET_VERSION",
            ClientMessage::CacheUrls { .. } => "CACHE_URLS",
            ClientMessage::NewsUpdated { .. } => "NEWS_UPDATED",
        }
    }
}

/// Reply to `GET_VERSION`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
    pub version: String,
}
