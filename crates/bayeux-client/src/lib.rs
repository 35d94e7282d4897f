//! Bayeux connection state machine, long polling, configuration and CLI.
//!
//! - [`BayeuxConnection`] - Handle to the connection actor
//! - [`BayeuxEvent`] - Notifications streamed from the connection
//! - [`ResponseHooks`] - Customization of response handling
//! - [`ClientConfig`] - TOML configuration for the `bayeux` binary
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bayeux_client::BayeuxConnection;
//! use bayeux_transport::{ReqwestTransport, TransportConfig};
//!
//! let transport = ReqwestTransport::new(TransportConfig::new("https://example.com/cometd")?)?;
//! let connection = BayeuxConnection::new(Arc::new(transport));
//! let mut events = connection.events();
//!
//! connection.handshake().await?.await?;
//! connection.subscribe("/chat/room1").await?.await?;
//! connection.publish("/chat/room1", serde_json::json!({"text": "hello"})).await?;
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod hooks;
pub mod state;
pub mod tracing;

pub use config::ClientConfig;
pub use connection::{BayeuxConnection, ConnectionBuilder, ConnectionOptions, PendingResponse};
pub use error::{ClientError, ClientResult, ProtocolViolation, ViolationKind};
pub use events::{BayeuxEvent, Notification};
pub use hooks::{DefaultHooks, ResponseHooks};
pub use state::{ConnectionState, ConnectionStatus};
