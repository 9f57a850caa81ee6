use std::fmt;
use thiserror::Error;

/// What a session was waiting on when a deadline expired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    RemoteAnswer,
    Gathering,
}

impl fmt::Display for WaitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitKind::RemoteAnswer => f.write_str("remote answer"),
            WaitKind::Gathering => f.write_str("candidate gathering"),
        }
    }
}

/// Top-level failure of a negotiation session. Everything fatal ends up here.
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("connection engine: {0}")]
    Engine(#[from] EngineError),
    #[error("signaling transport: {0}")]
    Transport(#[from] TransportError),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("timed out waiting for {0}")]
    Timeout(WaitKind),
    #[error("media capture failed: {0}")]
    Capture(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("call id cannot be blank")]
pub struct BlankCallId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("peer connection is closed")]
    Closed,
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel closed")]
    Closed,
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("bundle: {0}")]
    Codec(#[from] CodecError),
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("handshake: {0}")]
    Handshake(String),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty token")]
    Empty,
    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("gzip: {0}")]
    Compression(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("ICE server {0}: url cannot be empty")]
    EmptyUrl(String),
    #[error("ICE server {0}: TURN servers require username and credential")]
    MissingTurnCredentials(String),
}
