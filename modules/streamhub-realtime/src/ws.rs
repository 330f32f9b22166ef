//! Bidirectional messaging manager.
//!
//! Frames are a JSON envelope tagged by kind; subscriptions and publishes
//! are addressed by destination path strings. The server echoes pushed data
//! as `message` frames carrying the destination they belong to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use crate::{ConnectionStatus, RealtimeError};

/// Wire envelope for the messaging channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "camelCase")]
pub enum WsFrame {
    Subscribe { destination: String },
    Unsubscribe { destination: String },
    Send { destination: String, body: Value },
    Message { destination: String, body: Value },
}

type Callback = Arc<dyn Fn(Value) + Send + Sync>;

struct Inner {
    status: ConnectionStatus,
    subscriptions: HashMap<String, Callback>,
    outbound: Option<mpsc::UnboundedSender<WsFrame>>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

pub struct WsManager {
    url: String,
    inner: Arc<Mutex<Inner>>,
}

impl WsManager {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            inner: Arc::new(Mutex::new(Inner {
                status: ConnectionStatus::Disconnected,
                subscriptions: HashMap::new(),
                outbound: None,
                reader: None,
                writer: None,
            })),
        }
    }

    /// Perform the websocket handshake with the given credential. A no-op
    /// while connected or connecting. Handshake failure falls back to
    /// `Disconnected`. Destinations already in the registry are re-announced
    /// on the fresh connection, so subscriptions survive a reconnect.
    pub async fn connect(&self, access_token: &str) -> Result<(), RealtimeError> {
        {
            let mut inner = self.inner.lock().expect("ws state poisoned");
            if inner.status != ConnectionStatus::Disconnected {
                tracing::debug!("connect skipped: already connected or connecting");
                return Ok(());
            }
            inner.status = ConnectionStatus::Connecting;
        }

        tracing::info!(url = %self.url, "opening websocket");
        let attempt = async {
            let mut request = self.url.as_str().into_client_request()?;
            let bearer = HeaderValue::from_str(&format!("Bearer {access_token}"))
                .map_err(|err| RealtimeError::Connect(err.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, bearer);
            let (stream, _response) = connect_async(request).await?;
            Ok::<_, RealtimeError>(stream)
        }
        .await;

        let stream = match attempt {
            Ok(stream) => stream,
            Err(err) => {
                self.inner.lock().expect("ws state poisoned").status =
                    ConnectionStatus::Disconnected;
                tracing::error!(error = %err, "websocket connect failed");
                return Err(err);
            }
        };

        let (mut sink, mut source) = stream.split();
        let (outbound, mut pending) = mpsc::unbounded_channel::<WsFrame>();

        let writer = tokio::spawn(async move {
            while let Some(frame) = pending.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(error = %err, "frame serialization failed");
                        continue;
                    }
                };
                if let Err(err) = sink.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %err, "websocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_inner = self.inner.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => handle_frame(&text, &reader_inner),
                    Ok(Message::Close(_)) => break,
                    // Ping/pong are answered by the library.
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "websocket read failed");
                        break;
                    }
                }
            }
            let mut guard = reader_inner.lock().expect("ws state poisoned");
            guard.status = ConnectionStatus::Disconnected;
            guard.outbound = None;
            guard.reader = None;
            tracing::info!("websocket closed");
        });

        let mut inner = self.inner.lock().expect("ws state poisoned");
        // A disconnect issued during the handshake wins over its completion.
        if inner.status != ConnectionStatus::Connecting {
            tracing::debug!("connect abandoned: disconnected during handshake");
            reader.abort();
            drop(outbound);
            return Ok(());
        }
        for destination in inner.subscriptions.keys() {
            let _ = outbound.send(WsFrame::Subscribe {
                destination: destination.clone(),
            });
        }
        inner.status = ConnectionStatus::Connected;
        inner.outbound = Some(outbound);
        inner.reader = Some(reader);
        inner.writer = Some(writer);
        tracing::info!("websocket connected");
        Ok(())
    }

    /// Register a callback for a destination. At most one subscription per
    /// destination; a duplicate call is a no-op. The subscribe frame is sent
    /// only while connected (and re-sent by `connect` after a reconnect).
    pub fn subscribe(&self, destination: &str, callback: impl Fn(Value) + Send + Sync + 'static) {
        let mut inner = self.inner.lock().expect("ws state poisoned");
        if inner.subscriptions.contains_key(destination) {
            tracing::debug!(%destination, "already subscribed");
            return;
        }
        inner
            .subscriptions
            .insert(destination.to_string(), Arc::new(callback));
        if inner.status == ConnectionStatus::Connected {
            if let Some(outbound) = &inner.outbound {
                let _ = outbound.send(WsFrame::Subscribe {
                    destination: destination.to_string(),
                });
            }
        }
        tracing::debug!(%destination, "subscribed");
    }

    /// Drop the registry entry; the unsubscribe frame goes out only while
    /// connected. Safe to call while disconnected.
    pub fn unsubscribe(&self, destination: &str) {
        let mut inner = self.inner.lock().expect("ws state poisoned");
        if inner.subscriptions.remove(destination).is_none() {
            return;
        }
        if inner.status == ConnectionStatus::Connected {
            if let Some(outbound) = &inner.outbound {
                let _ = outbound.send(WsFrame::Unsubscribe {
                    destination: destination.to_string(),
                });
            }
        }
        tracing::debug!(%destination, "unsubscribed");
    }

    /// Publish a body to a destination. Only possible while connected;
    /// otherwise the delivery failure is logged and the message dropped —
    /// callers gate input affordances on [`is_connected`](Self::is_connected).
    pub fn send<B: Serialize>(&self, destination: &str, body: &B) {
        let inner = self.inner.lock().expect("ws state poisoned");
        if inner.status != ConnectionStatus::Connected {
            tracing::error!(%destination, "websocket not connected, message dropped");
            return;
        }
        let body = match serde_json::to_value(body) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, "message serialization failed");
                return;
            }
        };
        if let Some(outbound) = &inner.outbound {
            let _ = outbound.send(WsFrame::Send {
                destination: destination.to_string(),
                body,
            });
        }
    }

    /// Detach every subscription and close the transport.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock().expect("ws state poisoned");
        inner.subscriptions.clear();
        // Dropping the outbound sender ends the writer task, which closes
        // the sink.
        inner.outbound = None;
        if let Some(reader) = inner.reader.take() {
            reader.abort();
        }
        inner.writer.take();
        inner.status = ConnectionStatus::Disconnected;
        tracing::info!("websocket disconnected");
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock().expect("ws state poisoned").status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }
}

/// Route an incoming `message` frame to the subscriber for its destination.
fn handle_frame(text: &str, inner: &Arc<Mutex<Inner>>) {
    let frame = match serde_json::from_str::<WsFrame>(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(error = %err, "unparseable frame dropped");
            return;
        }
    };
    let WsFrame::Message { destination, body } = frame else {
        tracing::debug!("non-message frame ignored");
        return;
    };
    let callback = {
        let guard = inner.lock().expect("ws state poisoned");
        guard.subscriptions.get(&destination).cloned()
    };
    match callback {
        Some(callback) => callback(body),
        None => tracing::debug!(%destination, "message without subscriber dropped"),
    }
}
