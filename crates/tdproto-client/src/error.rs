//! Error types for the client.

use std::time::Duration;
use tdproto_core::{DecodeError, Token};

/// Failure of the channel itself. Terminal: every outstanding request
/// receives a copy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The peer's side of the channel ended.
    #[error("channel closed")]
    Closed,
    /// Reading or writing the transport failed.
    #[error("transport failed: {0}")]
    Transport(String),
    /// The client was shut down locally.
    #[error("client shut down: {0}")]
    Shutdown(String),
}

/// Errors surfaced to a caller of the client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("request {token} timed out after {after:?}")]
    Timeout { token: Token, after: Duration },

    #[error("request cancelled")]
    Cancelled,

    #[error("token {0} is already in flight")]
    DuplicateToken(Token),

    #[error("`{0}` is not a request known to the catalogue")]
    UnknownRequest(String),

    #[error("invalid request: {0}")]
    InvalidRequest(DecodeError),

    #[error("undecodable response: {0}")]
    Decode(DecodeError),

    #[error("expected a {expected} result, got `{tag}`")]
    UnexpectedResult { expected: String, tag: String },
}

/// An application-level error answer. This is a normal completion, not a
/// channel fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("TDLib error {code}: {message}")]
pub struct TdError {
    pub code: i32,
    /// Upper-case reason such as `CHAT_NOT_FOUND`.
    pub message: String,
}

/// Errors from writing to a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The receiving side has gone away.
    #[error("transport closed")]
    Closed,
    /// The underlying writer failed.
    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),
}
