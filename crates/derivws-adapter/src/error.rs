/*
[INPUT]:  Error sources (connect handshake, socket send, correlation, reply shape, config)
[OUTPUT]: Structured error types for every layer of the adapter
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use std::time::Duration;

use thiserror::Error;

/// Failure to bring a WebSocket connection to the Open state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// Handshake did not complete within the connect timeout
    #[error("connect timed out after {}ms", after.as_millis())]
    TimedOut { after: Duration },

    /// Peer unreachable or refused the TCP connection
    #[error("connection refused: {0}")]
    Refused(String),

    /// TLS, HTTP upgrade, URL or WebSocket protocol failure
    #[error("websocket protocol error: {0}")]
    Protocol(String),
}

/// Failure to hand a frame to the socket
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    #[error("websocket is not open")]
    NotOpen,
}

/// Failure of a single correlated request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    /// `request()` issued before the connection reached Open
    #[error("client is not connected")]
    NotConnected,

    /// No reply with the matching id arrived before the deadline
    #[error("no reply within {}ms", after.as_millis())]
    Timeout { after: Duration },

    /// The socket closed while the request was pending
    #[error("connection closed")]
    ConnectionClosed,

    #[error("send failed: {0}")]
    SendFailed(#[from] SendError),

    /// Reply arrived but lacks the field the caller expects
    #[error("reply is missing `{expected}`")]
    MalformedReply {
        expected: &'static str,
        reply: serde_json::Value,
    },

    #[error("request id {0} is already pending")]
    DuplicateRequestId(u64),

    /// Request payload was not a JSON object
    #[error("invalid request payload: {0}")]
    InvalidPayload(String),

    /// The remote API answered with an `error` object
    #[error("API error ({code}): {message}")]
    Api { code: String, message: String },
}

/// Main error type for the adapter's service layer
#[derive(Error, Debug)]
pub enum DerivError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Request(#[from] RequestError),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DerivError {
    /// Check if the failure happened before any request was sent
    pub fn is_connect_error(&self) -> bool {
        matches!(self, DerivError::Connect(_))
    }

    /// Raw reply carried by a `MalformedReply`, if any
    pub fn malformed_reply(&self) -> Option<&serde_json::Value> {
        match self {
            DerivError::Request(RequestError::MalformedReply { reply, .. }) => Some(reply),
            _ => None,
        }
    }
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, DerivError>;
