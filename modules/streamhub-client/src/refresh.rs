//! Single-flight gate around the token refresh call.
//!
//! At most one refresh is ever in flight. The first authorization failure
//! while the gate is idle becomes the leader and performs the refresh;
//! failures arriving while it runs enqueue a waiter and are resumed with the
//! leader's outcome, so every queued request retries with the same refreshed
//! credential.

use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::oneshot;

/// Broadcast to waiters when the leader's refresh call fails.
#[derive(Debug, Clone, Error)]
#[error("token refresh failed: {0}")]
pub struct RefreshFailed(pub String);

type Waiter = oneshot::Sender<std::result::Result<String, RefreshFailed>>;

struct GateState {
    refreshing: bool,
    waiters: Vec<Waiter>,
}

impl Default for GateState {
    fn default() -> Self {
        Self {
            refreshing: false,
            waiters: Vec::new(),
        }
    }
}

/// The leader's hold on the gate. Must be resolved with
/// [`finish`](Self::finish); if the leader's future is dropped mid-refresh
/// (caller timeout, select cancellation) the drop resolves the gate as
/// failed so queued waiters are resumed instead of hanging forever.
pub struct GateLease<'a> {
    gate: &'a RefreshGate,
    resolved: bool,
}

impl GateLease<'_> {
    /// Resolve the refresh, resuming every queued waiter with the same
    /// outcome and returning the gate to idle.
    pub fn finish(mut self, outcome: std::result::Result<String, RefreshFailed>) {
        self.resolved = true;
        self.gate.resolve(outcome);
    }
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::warn!("refresh abandoned mid-flight, failing queued waiters");
            self.gate
                .resolve(Err(RefreshFailed("refresh abandoned".to_string())));
        }
    }
}

/// Role handed to a caller entering the gate.
pub enum GateTicket<'a> {
    /// This caller performs the refresh and resolves the lease with the
    /// outcome.
    Leader(GateLease<'a>),
    /// A refresh is already in flight; await the leader's outcome.
    Follower(oneshot::Receiver<std::result::Result<String, RefreshFailed>>),
}

#[derive(Default)]
pub struct RefreshGate {
    state: Mutex<GateState>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the gate. While a refresh is in flight every caller becomes a
    /// follower; the queue is FIFO and drained when the lease resolves.
    pub fn begin(&self) -> GateTicket<'_> {
        let mut state = self.state.lock().expect("refresh gate poisoned");
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            tracing::debug!(queued = state.waiters.len(), "refresh in flight, queued");
            GateTicket::Follower(rx)
        } else {
            state.refreshing = true;
            GateTicket::Leader(GateLease {
                gate: self,
                resolved: false,
            })
        }
    }

    fn resolve(&self, outcome: std::result::Result<String, RefreshFailed>) {
        let waiters = {
            let mut state = self.state.lock().expect("refresh gate poisoned");
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            // A dropped receiver means the caller gave up; nothing to do.
            let _ = waiter.send(outcome.clone());
        }
    }
}
