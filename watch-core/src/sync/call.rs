//! Call signaling
//!
//! Relays WebRTC offer/answer/candidate messages between the two room
//! participants through the room's call collection. The media connection
//! itself is the platform's business.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::protocol::{current_time_ms, CallEnvelope, CallSignal};
use crate::store::{RemoteStore, StoreError, Subscription};

/// Writes this client's signals into the call collection
pub struct CallSignaling {
    store: Arc<dyn RemoteStore>,
    path: String,
    client_id: String,
}

impl CallSignaling {
    pub fn new(store: Arc<dyn RemoteStore>, path: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
            client_id: client_id.into(),
        }
    }

    pub async fn send(&self, signal: CallSignal) -> Result<String, StoreError> {
        let envelope = CallEnvelope {
            from: self.client_id.clone(),
            sent_at_ms: current_time_ms(),
            signal,
        };
        let key = self
            .store
            .push_append(&self.path, serde_json::to_value(&envelope)?)
            .await?;
        debug!("Sent call signal {}", key);
        Ok(key)
    }

    pub async fn subscribe(&self) -> Result<CallFeed, StoreError> {
        let subscription = self.store.subscribe(&self.path).await?;
        Ok(CallFeed::new(subscription, self.client_id.clone()))
    }
}

/// Peer signals not seen before, in send order
#[derive(Debug)]
pub struct CallFeed {
    subscription: Subscription,
    client_id: String,
    seen: HashSet<String>,
}

impl CallFeed {
    fn new(subscription: Subscription, client_id: String) -> Self {
        Self {
            subscription,
            client_id,
            seen: HashSet::new(),
        }
    }

    /// Wait for a snapshot carrying new peer signals. `None` once the
    /// subscription has ended.
    pub async fn next(&mut self) -> Option<Vec<CallSignal>> {
        loop {
            let snapshot = self.subscription.recv().await?;
            let signals = self.take_new(&snapshot);
            if !signals.is_empty() {
                return Some(signals);
            }
        }
    }

    /// Signals in `snapshot` from the peer that have not been returned yet
    pub fn take_new(&mut self, snapshot: &Value) -> Vec<CallSignal> {
        let Some(entries) = snapshot.as_object() else {
            return Vec::new();
        };

        let mut fresh: Vec<CallEnvelope> = Vec::new();
        for (key, value) in entries {
            if self.seen.contains(key) {
                continue;
            }
            self.seen.insert(key.clone());

            match serde_json::from_value::<CallEnvelope>(value.clone()) {
                Ok(envelope) if envelope.from != self.client_id => fresh.push(envelope),
                Ok(_) => {}
                Err(e) => warn!("Skipping malformed call signal {}: {}", key, e),
            }
        }

        fresh.sort_by_key(|e| e.sent_at_ms);
        fresh.into_iter().map(|e| e.signal).collect()
    }
}
