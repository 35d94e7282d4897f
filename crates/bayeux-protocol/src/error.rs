//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building or parsing Bayeux messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Channel name is empty or contains characters outside the allowed set.
    #[error("invalid channel name: {0:?}")]
    InvalidChannel(String),

    /// Bayeux error string does not follow `code:args:message`.
    #[error("malformed bayeux error {value:?}: {reason}")]
    MalformedError { value: String, reason: &'static str },

    /// Advice is not an object or carries wrongly typed members.
    #[error("malformed advice: {0}")]
    MalformedAdvice(String),

    /// A message field has an unexpected JSON type.
    #[error("field `{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    /// A required message field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A typed response was built from a message on another channel.
    #[error("expected channel {expected}, got {actual}")]
    UnexpectedChannel {
        expected: &'static str,
        actual: String,
    },

    /// Message is neither a JSON object nor an array of objects.
    #[error("message is not a JSON object")]
    NotAnObject,

    /// Payload contains no message.
    #[error("empty message")]
    EmptyMessage,

    /// Payload exceeds the accepted size.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// JSON (de)serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Creates an invalid field error.
    pub fn invalid_field(field: &'static str, expected: &'static str) -> Self {
        Self::InvalidField { field, expected }
    }

    /// Returns true if this error stems from a malformed value object
    /// (channel, error string, advice) rather than from message structure.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidChannel(_) | Self::MalformedError { .. } | Self::MalformedAdvice(_)
        )
    }
}
