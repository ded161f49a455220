//! Remote store contract
//!
//! The shared key-value service both clients talk to. Values are JSON,
//! writes are last-writer-wins per path, and subscriptions push the current
//! value of a path on every change (including the subscriber's own writes).

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::room_code::RoomCode;

/// Errors that can occur when talking to the store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store is offline")]
    Offline,

    #[error("Invalid payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Subscription closed")]
    Closed,

    #[error("Store error: {0}")]
    Api(String),
}

/// Real-time key-value store shared by the participants of a room
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Overwrite the value at `path`
    async fn publish(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Read the current value at `path` once
    async fn read_once(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Watch `path`. The current value (if any) is delivered first, then
    /// every change. Dropping the subscription unsubscribes.
    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;

    /// Append `value` to the collection at `collection_path`, returning the
    /// key it was stored under. Subscribers of the collection receive the
    /// whole collection as an object keyed by entry key.
    async fn push_append(&self, collection_path: &str, value: Value) -> Result<String, StoreError>;
}

/// Live view of one store path
pub struct Subscription {
    path: String,
    rx: mpsc::UnboundedReceiver<Value>,
    cancel: Option<oneshot::Sender<()>>,
}

impl Subscription {
    pub fn new(path: impl Into<String>, rx: mpsc::UnboundedReceiver<Value>) -> Self {
        Self {
            path: path.into(),
            rx,
            cancel: None,
        }
    }

    /// Attach a signal that is fired when the subscription goes away
    pub fn with_cancel(mut self, cancel: oneshot::Sender<()>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wait for the next value. `None` once the store side has gone away.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Take a value if one is already queued
    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("path", &self.path).finish()
    }
}

/// Store paths for everything that belongs to one room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPaths {
    pub meta: String,
    pub playback: String,
    pub chat: String,
    pub call: String,
}

impl RoomPaths {
    pub fn new(code: &RoomCode) -> Self {
        let root = format!("rooms/{}", code.as_str());
        Self {
            meta: format!("{}/meta", root),
            playback: format!("{}/playback", root),
            chat: format!("{}/chat", root),
            call: format!("{}/call", root),
        }
    }
}
