//! Bayeux channels, advice, errors and request/response message types.
//!
//! This crate models the JSON messages exchanged between a Bayeux client and
//! a CometD server. It performs no I/O; transports and the connection state
//! machine live in `bayeux-transport` and `bayeux-client`.
//!
//! # Wire format
//!
//! Every message is a JSON object with at least a `channel` field. A single
//! HTTP body may carry one object or an array of objects:
//!
//! ```text
//! [{"channel":"/meta/handshake","successful":true,"clientId":"abc"},
//!  {"channel":"/chat/room1","data":{"text":"hi"}}]
//! ```
//!
//! # Example
//!
//! ```rust
//! use bayeux_protocol::{Channel, Request, decode_messages, encode_request};
//!
//! let channel = Channel::new("/chat/room1").unwrap();
//! let request = Request::subscribe(&channel).with_client_id("abc");
//! let json = encode_request(&request).unwrap();
//! let messages = decode_messages(&json).unwrap();
//! assert_eq!(messages.len(), 1);
//! ```

mod advice;
mod bayeux_error;
mod channel;
mod codec;
mod error;
mod message;

pub use advice::{Advice, Reconnect};
pub use bayeux_error::BayeuxError;
pub use channel::{
    Channel, META_CONNECT, META_DISCONNECT, META_HANDSHAKE, META_PREFIX, META_SUBSCRIBE,
    META_UNSUBSCRIBE,
};
pub use codec::{MessageWriter, decode_messages, encode_request};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    BayeuxResponse, ConnectResponse, DisconnectResponse, HandshakeParams, HandshakeResponse,
    Method, Request, Response, SubscribeResponse, UnsubscribeResponse,
};

/// Bayeux protocol version announced during handshake.
pub const BAYEUX_VERSION: &str = "1.0";

/// Connection type used by the long-polling transport.
pub const LONG_POLLING: &str = "long-polling";

/// Maximum accepted payload size (4 MB).
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;
