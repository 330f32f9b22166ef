use std::env;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base origin for REST calls, e.g. `https://api.streamhub.example`.
    pub api_url: String,

    /// Base origin for the websocket endpoint, e.g. `wss://api.streamhub.example/ws`.
    pub ws_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            api_url: required_env("STREAMHUB_API_URL"),
            ws_url: required_env("STREAMHUB_WS_URL"),
            request_timeout_secs: env::var("STREAMHUB_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("STREAMHUB_REQUEST_TIMEOUT_SECS must be a number"),
        }
    }

    /// Build a config from explicit values. Tests use this so they never
    /// touch the process environment.
    pub fn new(api_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ws_url: ws_url.into(),
            request_timeout_secs: 30,
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
