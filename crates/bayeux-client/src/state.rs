//! Connection state and the shared status snapshot.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

/// Lifecycle state of a Bayeux connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No session. Only a handshake may be started.
    #[default]
    Disconnected,
    /// A handshake is in flight.
    Connecting,
    /// The server issued a client id.
    Connected,
}

impl ConnectionState {
    /// Returns the lowercase name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a connection, as last published by its actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Current state.
    pub state: ConnectionState,
    /// Client id issued at handshake. Set if and only if connected.
    pub client_id: Option<String>,
    /// Subscribed channels, in subscription order.
    pub subscriptions: Vec<String>,
    /// Whether the long-polling loop is running.
    pub long_polling: bool,
}

impl ConnectionStatus {
    /// Returns true if `channel` is in the subscription set.
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscriptions.iter().any(|c| c == channel)
    }
}

/// Creates the status channel. The actor holds the sender and replaces the
/// value before it resolves any reply, so a handle never reads a status
/// older than the last answer it received.
pub fn status_channel() -> (watch::Sender<ConnectionStatus>, watch::Receiver<ConnectionStatus>) {
    watch::channel(ConnectionStatus::default())
}
