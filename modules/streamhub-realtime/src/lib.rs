//! Realtime push subscriptions.
//!
//! Two independent transport managers expose the same surface to feature
//! code: `connect` / `disconnect`, and `subscribe(topic, callback)` with at
//! most one live subscription per topic. Both `connect` and `subscribe` are
//! idempotent no-ops on duplicate calls so view-layer effect re-entry never
//! duplicates listeners.
//!
//! - [`SseManager`] — one long-lived server-push text-event stream,
//!   multiplexing named topics as event types.
//! - [`WsManager`] — one bidirectional websocket, addressing subscriptions
//!   and publishes by destination path.

pub mod error;
pub mod sse;
pub mod ws;

pub use error::RealtimeError;
pub use sse::{SseManager, SsePayload};
pub use ws::{WsFrame, WsManager};

/// Transport lifecycle shared by both managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}
