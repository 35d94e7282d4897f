//! Client error types.

use std::fmt;

use bayeux_protocol::{ProtocolError, Request, Response};
use bayeux_transport::TransportError;
use thiserror::Error;

use crate::state::ConnectionState;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised by a Bayeux connection.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The operation is not legal in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the connection was in.
        state: ConnectionState,
    },

    /// Subscribe on a channel that is already subscribed.
    #[error("already subscribed to {0}")]
    AlreadySubscribed(String),

    /// Unsubscribe on a channel that is not subscribed.
    #[error("not subscribed to {0}")]
    NotSubscribed(String),

    /// Long polling needs a secondary transport.
    #[error("no long-polling transport configured")]
    LongPollingUnavailable,

    /// Long polling was started twice.
    #[error("long polling is already running")]
    LongPollingActive,

    /// A received message broke the protocol.
    #[error(transparent)]
    ProtocolViolation(Box<ProtocolViolation>),

    /// A value failed to parse or serialize.
    #[error("format error: {0}")]
    Format(#[from] ProtocolError),

    /// The HTTP request failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request was cancelled before a response arrived.
    #[error("request cancelled")]
    Cancelled,

    /// The connection actor has shut down.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server replied, but nothing in the reply answered the request.
    #[error("no response to request {0}")]
    NoResponse(String),

    /// The server answered with `successful: false`.
    #[error("server rejected {0}")]
    Rejected(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn invalid_state(operation: &'static str, state: ConnectionState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Returns the protocol violation, if this is one.
    pub fn violation(&self) -> Option<&ProtocolViolation> {
        match self {
            Self::ProtocolViolation(v) => Some(v),
            _ => None,
        }
    }
}

impl From<ProtocolViolation> for ClientError {
    fn from(violation: ProtocolViolation) -> Self {
        Self::ProtocolViolation(Box::new(violation))
    }
}

/// What was wrong with a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// The message has no channel or an empty one.
    MissingChannel,
    /// A meta reply arrived on a different meta channel than the request.
    ChannelMismatch,
    /// The reply id does not match the request id.
    IdMismatch,
    /// A successful handshake without a client id.
    EmptyClientId,
}

impl ViolationKind {
    /// Returns a short description.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingChannel => "message has no channel",
            Self::ChannelMismatch => "reply channel does not match request",
            Self::IdMismatch => "reply id does not match request",
            Self::EmptyClientId => "successful handshake without client id",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol violation, with everything needed to diagnose it.
#[derive(Debug, Clone, Error)]
#[error("protocol violation: {kind}")]
pub struct ProtocolViolation {
    /// What went wrong.
    pub kind: ViolationKind,
    /// The request the message was matched against.
    pub request: Option<Request>,
    /// The parsed message, if it got that far.
    pub response: Option<Response>,
    /// The offending message as JSON text.
    pub raw: String,
}

impl ProtocolViolation {
    pub(crate) fn new(kind: ViolationKind, request: Option<&Request>, raw: String) -> Self {
        Self {
            kind,
            request: request.cloned(),
            response: None,
            raw,
        }
    }

    pub(crate) fn with_response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }
}
