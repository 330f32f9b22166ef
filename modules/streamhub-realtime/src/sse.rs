//! Server-push text-event-stream manager.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::{ConnectionStatus, RealtimeError};

/// What a subscriber receives for one event. Payloads are JSON on the wire;
/// a payload that fails to parse is delivered raw so feature code can decide
/// how to degrade.
#[derive(Debug, Clone)]
pub enum SsePayload {
    Json(Value),
    Raw(String),
}

type Callback = Arc<dyn Fn(SsePayload) + Send + Sync>;

struct Inner {
    status: ConnectionStatus,
    subscriptions: HashMap<String, Callback>,
    reader: Option<JoinHandle<()>>,
}

/// Manager for the single long-lived event stream of a session. Topics map
/// onto SSE event types; the reader task routes each event to the one
/// callback registered for its topic.
pub struct SseManager {
    http: reqwest::Client,
    url: String,
    inner: Arc<Mutex<Inner>>,
}

impl SseManager {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            inner: Arc::new(Mutex::new(Inner {
                status: ConnectionStatus::Disconnected,
                subscriptions: HashMap::new(),
                reader: None,
            })),
        }
    }

    /// Open the stream with the given credential. A no-op while connected or
    /// while a connect attempt is in flight (the status reads `Connecting`
    /// for its duration). Handshake failure falls back to `Disconnected`.
    pub async fn connect(&self, access_token: &str) -> Result<(), RealtimeError> {
        {
            let mut inner = self.inner.lock().expect("sse state poisoned");
            if inner.status != ConnectionStatus::Disconnected {
                tracing::debug!("connect skipped: already connected or connecting");
                return Ok(());
            }
            inner.status = ConnectionStatus::Connecting;
        }

        tracing::info!(url = %self.url, "opening event stream");
        let attempt = self
            .http
            .get(&self.url)
            .bearer_auth(access_token)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .and_then(|response| response.error_for_status());

        let response = match attempt {
            Ok(response) => response,
            Err(err) => {
                self.inner.lock().expect("sse state poisoned").status =
                    ConnectionStatus::Disconnected;
                tracing::error!(error = %err, "event stream connect failed");
                return Err(err.into());
            }
        };

        let mut inner = self.inner.lock().expect("sse state poisoned");
        // A disconnect issued during the handshake wins over its completion.
        if inner.status != ConnectionStatus::Connecting {
            tracing::debug!("connect abandoned: disconnected during handshake");
            return Ok(());
        }
        inner.status = ConnectionStatus::Connected;
        inner.reader = Some(tokio::spawn(read_stream(response, self.inner.clone())));
        tracing::info!("event stream connected");
        Ok(())
    }

    /// Register a callback for a topic. At most one subscription per topic;
    /// a duplicate call is a no-op so effect re-entry never swaps callbacks.
    pub fn subscribe(&self, topic: &str, callback: impl Fn(SsePayload) + Send + Sync + 'static) {
        let mut inner = self.inner.lock().expect("sse state poisoned");
        if inner.subscriptions.contains_key(topic) {
            tracing::debug!(%topic, "already subscribed");
            return;
        }
        inner
            .subscriptions
            .insert(topic.to_string(), Arc::new(callback));
        tracing::debug!(%topic, "subscribed");
    }

    /// Drop the registry entry for a topic. Safe to call while disconnected.
    pub fn unsubscribe(&self, topic: &str) {
        let mut inner = self.inner.lock().expect("sse state poisoned");
        if inner.subscriptions.remove(topic).is_some() {
            tracing::debug!(%topic, "unsubscribed");
        }
    }

    /// Detach every subscription, stop the reader and close the stream.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock().expect("sse state poisoned");
        inner.subscriptions.clear();
        if let Some(reader) = inner.reader.take() {
            reader.abort();
        }
        inner.status = ConnectionStatus::Disconnected;
        tracing::info!("event stream disconnected");
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock().expect("sse state poisoned").status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }
}

/// Consume the byte stream, splitting it into SSE frames on blank lines.
/// When the stream ends or errors the manager falls back to `Disconnected`.
async fn read_stream(response: reqwest::Response, inner: Arc<Mutex<Inner>>) {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                buffer.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(boundary) = buffer.find("\n\n") {
                    let frame = buffer[..boundary].to_string();
                    buffer.drain(..boundary + 2);
                    dispatch(&frame, &inner);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "event stream error");
                break;
            }
        }
    }
    let mut guard = inner.lock().expect("sse state poisoned");
    guard.status = ConnectionStatus::Disconnected;
    guard.reader = None;
    tracing::info!("event stream closed");
}

/// Parse one SSE frame (`event:` / `data:` lines) and route it to the
/// subscriber for its event name, if any.
fn dispatch(frame: &str, inner: &Arc<Mutex<Inner>>) {
    let mut event = "message".to_string();
    let mut data_lines: Vec<&str> = Vec::new();
    for line in frame.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(value) = line.strip_prefix("event:") {
            event = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
        // id/retry fields and comments are not used by this protocol
    }
    if data_lines.is_empty() {
        return;
    }
    let data = data_lines.join("\n");

    // Clone the callback out so delivery never runs under the registry lock.
    let callback = {
        let guard = inner.lock().expect("sse state poisoned");
        guard.subscriptions.get(&event).cloned()
    };
    let Some(callback) = callback else {
        tracing::debug!(topic = %event, "event without subscriber dropped");
        return;
    };

    let payload = match serde_json::from_str::<Value>(&data) {
        Ok(json) => SsePayload::Json(json),
        Err(err) => {
            tracing::warn!(topic = %event, error = %err, "payload parse failed, delivering raw");
            SsePayload::Raw(data)
        }
    };
    callback(payload);
}
