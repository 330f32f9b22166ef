//! The authenticated session held by the gateway.

use std::sync::RwLock;

use streamhub_common::{JwtDto, UserSummary};
use tokio::sync::watch;

/// Current token pair plus a broadcast channel for sign-in/sign-out
/// transitions. Mutated only by the gateway's own auth and refresh paths.
pub struct AuthSession {
    inner: RwLock<Option<JwtDto>>,
    authenticated: watch::Sender<bool>,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self {
            inner: RwLock::new(None),
            authenticated: watch::Sender::new(false),
        }
    }
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner
            .read()
            .expect("session poisoned")
            .as_ref()
            .map(|jwt| jwt.access_token.clone())
    }

    pub fn user(&self) -> Option<UserSummary> {
        self.inner
            .read()
            .expect("session poisoned")
            .as_ref()
            .map(|jwt| jwt.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().expect("session poisoned").is_some()
    }

    /// Observe sign-in/sign-out transitions.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }

    pub(crate) fn set(&self, jwt: JwtDto) {
        *self.inner.write().expect("session poisoned") = Some(jwt);
        self.authenticated.send_replace(true);
    }

    pub(crate) fn clear(&self) {
        *self.inner.write().expect("session poisoned") = None;
        self.authenticated.send_replace(false);
    }
}
