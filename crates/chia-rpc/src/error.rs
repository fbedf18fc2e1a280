//! Client error types

use std::path::PathBuf;
use std::time::Duration;

use chia_config::ConfigError;
use chia_protocol::RequestId;

/// Errors surfaced by [`ChiaClient`](crate::ChiaClient) operations
///
/// State errors (`AlreadyConnected`, `NotConnected`) fail only the call that
/// hit them. Nothing here is retried by the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("already connected")]
    AlreadyConnected,

    #[error("not connected")]
    NotConnected,

    #[error("connection closed before a reply arrived")]
    ConnectionClosed,

    #[error("timed out after {after:?} connecting to {url}")]
    ConnectTimeout { url: String, after: Duration },

    #[error("timed out after {after:?} waiting for reply to request {request_id}")]
    Timeout {
        request_id: RequestId,
        after: Duration,
    },

    /// The reply payload carried `success: false`; holds its `error` verbatim.
    #[error("{0}")]
    Remote(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load client identity from {path}: {message}")]
    Identity { path: PathBuf, message: String },

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }
}
