//! The authenticated request gateway.
//!
//! [`ApiClient`] wraps every outbound HTTP call: it injects the bearer
//! credential and the anti-forgery header, and on an authorization failure
//! runs the single-flight refresh-and-retry protocol — concurrent 401s share
//! one refresh call and every affected request is retried exactly once with
//! the refreshed credential.

pub mod auth;
pub mod client;
pub mod error;
pub mod refresh;
pub mod session;

pub use client::ApiClient;
pub use error::{ClientError, Result};
pub use refresh::{GateLease, GateTicket, RefreshFailed, RefreshGate};
pub use session::AuthSession;
