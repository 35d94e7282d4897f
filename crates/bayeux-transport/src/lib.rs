//! HTTP transports for Bayeux connections.
//!
//! - [`HttpTransport`] - The contract a connection sends requests through
//! - [`ReqwestTransport`] - Production transport built on reqwest
//! - [`RecordedTransport`] - Scripted playback for tests
//! - [`TransportError`] - Error types for transport operations
//!
//! # Example
//!
//! ```ignore
//! use bayeux_transport::{HttpTransport, ReqwestTransport, TransportConfig, TransportRequest};
//!
//! let config = TransportConfig::new("https://example.com/cometd")?;
//! let transport = ReqwestTransport::new(config)?;
//! let response = transport.send(TransportRequest::new(body)).await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod recorded;
pub mod transport;

pub use client::ReqwestTransport;
pub use config::TransportConfig;
pub use error::{TransportError, TransportErrorCode, TransportResult};
pub use recorded::RecordedTransport;
pub use transport::{
    BoxFuture, Decoding, HttpTransport, Payload, TransportRequest, TransportResponse,
};
