//! In-process store
//!
//! Shares one value tree between every handle cloned from the same
//! `MemoryStore`, which is how two clients in one process (tests, demos)
//! see each other's writes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::debug;

use super::remote::{RemoteStore, StoreError, Subscription};

#[derive(Default)]
struct Inner {
    values: HashMap<String, Value>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Value>>>,
    /// Every accepted write, in order. Kept for assertions only.
    #[cfg(test)]
    writes: Vec<(String, Value)>,
    next_key: u64,
    offline: bool,
}

impl Inner {
    fn notify(&mut self, path: &str) {
        let Some(value) = self.values.get(path).cloned() else {
            return;
        };
        if let Some(subscribers) = self.subscribers.get_mut(path) {
            // Closed receivers are unsubscribed subscriptions
            subscribers.retain(|tx| tx.send(value.clone()).is_ok());
        }
    }
}

/// Store kept entirely in memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail with `StoreError::Offline` until switched back
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Values written to `path`, oldest first
    #[cfg(test)]
    pub fn writes(&self, path: &str) -> Vec<Value> {
        self.inner
            .lock()
            .writes
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Current value at `path`
    pub fn snapshot(&self, path: &str) -> Option<Value> {
        self.inner.lock().values.get(path).cloned()
    }

    /// Number of live subscriptions on `path`
    pub fn subscriber_count(&self, path: &str) -> usize {
        self.inner
            .lock()
            .subscribers
            .get(path)
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn publish(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.offline {
            return Err(StoreError::Offline);
        }
        #[cfg(test)]
        inner.writes.push((path.to_string(), value.clone()));
        inner.values.insert(path.to_string(), value);
        inner.notify(path);
        Ok(())
    }

    async fn read_once(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.lock();
        if inner.offline {
            return Err(StoreError::Offline);
        }
        Ok(inner.values.get(path).cloned())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if let Some(value) = inner.values.get(path) {
            let _ = tx.send(value.clone());
        }
        inner
            .subscribers
            .entry(path.to_string())
            .or_default()
            .push(tx);
        debug!("Memory store: subscribed to {}", path);
        Ok(Subscription::new(path, rx))
    }

    async fn push_append(&self, collection_path: &str, value: Value) -> Result<String, StoreError> {
        let mut inner = self.inner.lock();
        if inner.offline {
            return Err(StoreError::Offline);
        }

        // Zero-padded so key order is insertion order
        inner.next_key += 1;
        let key = format!("k{:012}", inner.next_key);

        #[cfg(test)]
        inner.writes.push((collection_path.to_string(), value.clone()));

        let entry = inner
            .values
            .entry(collection_path.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(map) = entry {
            map.insert(key.clone(), value);
        }

        inner.notify(collection_path);
        Ok(key)
    }
}
