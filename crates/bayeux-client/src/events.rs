//! Notifications emitted by a connection.
//!
//! Every notification goes out on one broadcast channel as a [`BayeuxEvent`],
//! in the order the actor produced it.

use std::sync::Arc;

use bayeux_protocol::BayeuxResponse;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// The payload shared by every event kind.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// HTTP status of the exchange, 0 when the server never answered.
    pub status: u16,
    /// Status description. For failure events, the error message.
    pub description: String,
    /// The raw payload text as received.
    #[serde(skip)]
    pub raw: Arc<str>,
    /// The parsed message, or `null` when parsing failed.
    pub message: Value,
    /// The typed response, where one was built.
    #[serde(skip)]
    pub response: Option<Arc<BayeuxResponse>>,
    /// When the actor produced the event.
    pub received_at: DateTime<Utc>,
}

impl Notification {
    /// Creates a notification stamped with the current time.
    pub fn new(
        status: u16,
        description: impl Into<String>,
        raw: Arc<str>,
        message: Value,
    ) -> Self {
        Self {
            status,
            description: description.into(),
            raw,
            message,
            response: None,
            received_at: Utc::now(),
        }
    }

    /// Attaches a typed response.
    pub fn with_response(mut self, response: Arc<BayeuxResponse>) -> Self {
        self.response = Some(response);
        self
    }

    /// Replaces the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the channel of the message, if it has one.
    pub fn channel(&self) -> Option<&str> {
        self.message.get("channel").and_then(Value::as_str)
    }

    /// Returns the `data` member of the message.
    pub fn data(&self) -> Option<&Value> {
        self.message.get("data")
    }
}

/// A connection notification.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BayeuxEvent {
    /// Handshake succeeded.
    Connected(Notification),
    /// Handshake failed.
    ConnectionFailed(Notification),
    /// The server acknowledged a disconnect.
    Disconnected(Notification),
    /// A payload arrived on either transport.
    DataReceived(Notification),
    /// A payload or a message within it could not be processed.
    DataFailed(Notification),
    /// A message arrived on a subscribed channel.
    EventReceived(Notification),
    /// Any other message was processed.
    ResponseReceived(Notification),
    /// Long polling gave up after too many failures.
    LongPollingFailed(Notification),
}

impl BayeuxEvent {
    /// Returns the notification payload.
    pub fn notification(&self) -> &Notification {
        match self {
            Self::Connected(n)
            | Self::ConnectionFailed(n)
            | Self::Disconnected(n)
            | Self::DataReceived(n)
            | Self::DataFailed(n)
            | Self::EventReceived(n)
            | Self::ResponseReceived(n)
            | Self::LongPollingFailed(n) => n,
        }
    }

    /// Returns the snake_case event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::ConnectionFailed(_) => "connection_failed",
            Self::Disconnected(_) => "disconnected",
            Self::DataReceived(_) => "data_received",
            Self::DataFailed(_) => "data_failed",
            Self::EventReceived(_) => "event_received",
            Self::ResponseReceived(_) => "response_received",
            Self::LongPollingFailed(_) => "long_polling_failed",
        }
    }

    /// Returns true for the failure kinds.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::DataFailed(_) | Self::LongPollingFailed(_)
        )
    }
}
