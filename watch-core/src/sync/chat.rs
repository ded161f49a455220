//! Chat reconciler
//!
//! Messages are appended to the room's chat collection. Every delivery of
//! the collection is turned into the full, ordered conversation.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::protocol::{current_time_ms, ChatMessage, MAX_CHAT_LEN};
use crate::store::{RemoteStore, StoreError, Subscription};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message is empty")]
    Empty,

    #[error("Message is too long ({len} characters)")]
    TooLong { len: usize },

    #[error("Failed to send message: {0}")]
    Store(#[from] StoreError),
}

/// Trim and check a message before it is sent
pub fn validate_text(text: &str) -> Result<&str, ChatError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Empty);
    }
    let len = trimmed.chars().count();
    if len > MAX_CHAT_LEN {
        return Err(ChatError::TooLong { len });
    }
    Ok(trimmed)
}

/// Turn a chat collection snapshot into messages ordered by send time.
///
/// Entries with equal timestamps keep collection order. Malformed entries
/// are skipped.
pub fn order_messages(snapshot: &Value) -> Vec<ChatMessage> {
    let Some(entries) = snapshot.as_object() else {
        return Vec::new();
    };

    let mut messages: Vec<ChatMessage> = entries
        .iter()
        .filter_map(|(key, value)| {
            match serde_json::from_value::<ChatMessage>(value.clone()) {
                Ok(mut message) => {
                    message.id = key.clone();
                    Some(message)
                }
                Err(e) => {
                    warn!("Skipping malformed chat entry {}: {}", key, e);
                    None
                }
            }
        })
        .collect();

    messages.sort_by_key(|m| m.sent_at_ms);
    messages
}

/// Sends messages into one room's chat collection
pub struct ChatReconciler {
    store: Arc<dyn RemoteStore>,
    path: String,
    sender: String,
}

impl ChatReconciler {
    pub fn new(store: Arc<dyn RemoteStore>, path: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
            sender: sender.into(),
        }
    }

    /// Append a message. The returned message carries the store key.
    pub async fn send(&self, text: &str) -> Result<ChatMessage, ChatError> {
        let text = validate_text(text)?;

        let mut message = ChatMessage {
            id: String::new(),
            sender: self.sender.clone(),
            text: text.to_string(),
            sent_at_ms: current_time_ms(),
        };
        let value = serde_json::to_value(&message).map_err(StoreError::from)?;
        message.id = self.store.push_append(&self.path, value).await?;

        debug!("Sent chat message {}", message.id);
        Ok(message)
    }

    pub async fn subscribe(&self) -> Result<ChatFeed, StoreError> {
        let subscription = self.store.subscribe(&self.path).await?;
        Ok(ChatFeed { subscription })
    }
}

/// Ordered conversation snapshots for a room
#[derive(Debug)]
pub struct ChatFeed {
    subscription: Subscription,
}

impl ChatFeed {
    /// Next full conversation. `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Vec<ChatMessage>> {
        let snapshot = self.subscription.recv().await?;
        Some(order_messages(&snapshot))
    }
}
