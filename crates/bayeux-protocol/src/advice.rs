//! Server reconnection advice.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// What the server wants the client to do after a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reconnect {
    /// Do not reconnect.
    #[default]
    None,
    /// Perform a new handshake.
    Handshake,
    /// Retry the connect request.
    Retry,
}

impl Reconnect {
    /// Parses a reconnect value case-insensitively.
    ///
    /// Unrecognized values map to [`Reconnect::None`].
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("handshake") {
            Self::Handshake
        } else if value.eq_ignore_ascii_case("retry") {
            Self::Retry
        } else {
            Self::None
        }
    }

    /// Returns the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Handshake => "handshake",
            Self::Retry => "retry",
        }
    }
}

/// Reconnection guidance sent by the server on handshake and connect replies.
///
/// The client only parses advice; applying it is up to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Advice {
    /// Reconnect strategy.
    pub reconnect: Reconnect,
    /// Delay before the next connect, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    /// How long the server holds a long-poll, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}

impl Advice {
    /// Creates advice with the given strategy and no timings.
    pub fn new(reconnect: Reconnect) -> Self {
        Self {
            reconnect,
            interval: None,
            timeout: None,
        }
    }

    /// Builder: set interval.
    pub fn with_interval(mut self, interval: i64) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Builder: set timeout.
    pub fn with_timeout(mut self, timeout: i64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Parses advice out of the `advice` member of a message.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedAdvice`] if the value is not an
    /// object, `reconnect` is not a string, or a timing is not an integer.
    pub fn from_value(value: &Value) -> ProtocolResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ProtocolError::MalformedAdvice("advice must be an object".into()))?;

        let reconnect = match object.get("reconnect") {
            None | Some(Value::Null) => Reconnect::None,
            Some(Value::String(s)) => Reconnect::parse(s),
            Some(other) => {
                return Err(ProtocolError::MalformedAdvice(format!(
                    "reconnect must be a string, got {other}"
                )));
            }
        };

        Ok(Self {
            reconnect,
            interval: integer_member(object, "interval")?,
            timeout: integer_member(object, "timeout")?,
        })
    }
}

fn integer_member(
    object: &serde_json::Map<String, Value>,
    name: &str,
) -> ProtocolResult<Option<i64>> {
    match object.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| {
            ProtocolError::MalformedAdvice(format!("{name} must be an integer, got {value}"))
        }),
    }
}

impl<'de> Deserialize<'de> for Advice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}
