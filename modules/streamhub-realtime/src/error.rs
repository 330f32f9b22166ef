use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Connect error: {0}")]
    Connect(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for RealtimeError {
    fn from(err: reqwest::Error) -> Self {
        RealtimeError::Connect(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RealtimeError::Connect(err.to_string())
    }
}
