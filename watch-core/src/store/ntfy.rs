//! Store backed by an ntfy pub/sub server
//!
//! Each store path maps to one topic. The newest message on a topic is the
//! current value of that path. Collection entries are published as
//! `{"pushKey": .., "value": ..}` envelopes and folded into an object keyed
//! by push key. Subscriptions use ntfy's newline-delimited JSON stream.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use super::remote::{RemoteStore, StoreError, Subscription};
use crate::sync::current_time_ms;

/// Default ntfy server
const DEFAULT_BASE_URL: &str = "https://ntfy.sh";

/// Topic prefix so rooms don't collide with unrelated topics
const DEFAULT_TOPIC_PREFIX: &str = "watch-together";

/// How far back cached messages are replayed when reading a path
const DEFAULT_POLL_SINCE: &str = "12h";

/// Delay before reopening a dropped subscription stream
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Connection settings for the ntfy backend
#[derive(Debug, Clone)]
pub struct NtfyConfig {
    /// Server URL (e.g. "https://ntfy.sh" or your own)
    pub base_url: String,
    /// Prefix prepended to every topic
    pub topic_prefix: String,
    /// Timeout for publish and poll requests (not for streams)
    pub request_timeout: Duration,
    /// ntfy `since` value used when replaying a topic
    pub poll_since: String,
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            request_timeout: Duration::from_secs(10),
            poll_since: DEFAULT_POLL_SINCE.to_string(),
        }
    }
}

/// One line of ntfy's JSON stream
#[derive(Debug, Clone, Deserialize)]
struct NtfyEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    event: String,
    #[serde(default)]
    message: Option<String>,
}

/// Body published for collection entries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushEnvelope {
    push_key: String,
    value: Value,
}

/// Folds topic messages into the value a path currently holds
#[derive(Debug, Default)]
struct TopicView {
    latest: Option<Value>,
    entries: Option<Map<String, Value>>,
}

impl TopicView {
    fn apply(&mut self, body: &str) {
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            warn!("ntfy store: ignoring non-JSON message");
            return;
        };

        match serde_json::from_value::<PushEnvelope>(value.clone()) {
            Ok(envelope) => {
                self.entries
                    .get_or_insert_with(Map::new)
                    .insert(envelope.push_key, envelope.value);
            }
            Err(_) => self.latest = Some(value),
        }
    }

    fn current(&self) -> Option<Value> {
        match &self.entries {
            Some(entries) => Some(Value::Object(entries.clone())),
            None => self.latest.clone(),
        }
    }
}

/// Remote store speaking the ntfy HTTP API
#[derive(Debug, Clone)]
pub struct NtfyStore {
    http: Client,
    config: NtfyConfig,
}

impl NtfyStore {
    /// Create a store against the public ntfy.sh server
    pub fn new() -> Self {
        Self::with_config(NtfyConfig::default())
    }

    pub fn with_config(config: NtfyConfig) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { http, config }
    }

    pub fn config(&self) -> &NtfyConfig {
        &self.config
    }

    /// Topic name for a store path - lowercase alphanumerics joined by hyphens
    fn topic(&self, path: &str) -> String {
        let normalized: String = path
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();
        format!("{}-{}", self.config.topic_prefix, normalized)
    }

    fn topic_url(&self, topic: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), topic)
    }

    /// Fetch cached messages on a topic
    async fn poll_topic(&self, topic: &str) -> Result<Vec<NtfyEvent>, StoreError> {
        let url = format!(
            "{}/json?poll=1&since={}",
            self.topic_url(topic),
            self.config.poll_since
        );

        let text = self
            .http
            .get(&url)
            .timeout(self.config.request_timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(parse_events(&text))
    }

    /// Stream a topic into `tx` until the receiver goes away
    async fn stream_topic(&self, topic: String, tx: mpsc::UnboundedSender<Value>) {
        let mut view = TopicView::default();
        let mut since = "none".to_string();

        match self.poll_topic(&topic).await {
            Ok(events) => {
                for event in &events {
                    if let Some(body) = &event.message {
                        view.apply(body);
                    }
                    since = event.id.clone();
                }
                if let Some(current) = view.current() {
                    let _ = tx.send(current);
                }
            }
            Err(e) => warn!("ntfy store: initial poll of {} failed: {}", topic, e),
        }
        if since == "none" {
            since = "now".to_string();
        }

        while !tx.is_closed() {
            let url = format!("{}/json?since={}", self.topic_url(&topic), since);
            debug!("ntfy store: opening stream {}", url);

            match self.read_stream(&url, &mut view, &mut since, &tx).await {
                Ok(()) => debug!("ntfy store: stream for {} ended", topic),
                Err(e) => warn!("ntfy store: stream for {} failed: {}", topic, e),
            }

            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn read_stream(
        &self,
        url: &str,
        view: &mut TopicView,
        since: &mut String,
        tx: &mpsc::UnboundedSender<Value>,
    ) -> Result<(), StoreError> {
        let mut resp = self.http.get(url).send().await?.error_for_status()?;
        let mut buf: Vec<u8> = Vec::new();

        while let Some(chunk) = resp.chunk().await? {
            buf.extend_from_slice(&chunk);

            while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let Some(event) = parse_event(&line) else {
                    continue;
                };
                if event.event != "message" {
                    continue;
                }
                *since = event.id.clone();
                if let Some(body) = &event.message {
                    view.apply(body);
                    if let Some(current) = view.current() {
                        if tx.send(current).is_err() {
                            return Ok(());
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for NtfyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_event(line: &str) -> Option<NtfyEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    serde_json::from_str(line).ok()
}

/// ntfy returns newline-delimited JSON; keep only message events
fn parse_events(text: &str) -> Vec<NtfyEvent> {
    text.lines()
        .filter_map(parse_event)
        .filter(|e| e.event == "message")
        .collect()
}

#[async_trait]
impl RemoteStore for NtfyStore {
    #[instrument(skip(self, value), fields(base_url = %self.config.base_url))]
    async fn publish(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let topic = self.topic(path);
        let body = serde_json::to_string(&value)?;

        self.http
            .post(self.topic_url(&topic))
            .timeout(self.config.request_timeout)
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        debug!("ntfy store: published to {}", topic);
        Ok(())
    }

    async fn read_once(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let topic = self.topic(path);
        let mut view = TopicView::default();
        for event in self.poll_topic(&topic).await? {
            if let Some(body) = &event.message {
                view.apply(body);
            }
        }
        Ok(view.current())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let topic = self.topic(path);
        let (tx, rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        info!("ntfy store: subscribing to {} (topic: {})", path, topic);

        let store = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_rx => debug!("ntfy store: unsubscribed from {}", topic),
                _ = store.stream_topic(topic.clone(), tx) => {}
            }
        });

        Ok(Subscription::new(path, rx).with_cancel(cancel_tx))
    }

    async fn push_append(&self, collection_path: &str, value: Value) -> Result<String, StoreError> {
        // Millisecond prefix keeps keys roughly in send order
        let push_key = format!("{:013}-{:08x}", current_time_ms(), rand::random::<u32>());
        let envelope = serde_json::to_value(PushEnvelope {
            push_key: push_key.clone(),
            value,
        })?;

        self.publish(collection_path, envelope).await?;
        Ok(push_key)
    }
}
