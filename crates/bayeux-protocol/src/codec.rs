//! JSON encoding of outgoing requests and splitting of incoming payloads.
//!
//! A payload received from the server is either a single message object or
//! an array of message objects:
//!
//! ```text
//! {"channel":"/meta/connect","successful":true}
//! [{"channel":"/meta/connect","successful":true},{"channel":"/chat","data":1}]
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};
use crate::message::Request;

/// Encodes a single request as a JSON object.
///
/// # Example
///
/// ```rust
/// use bayeux_protocol::{encode_request, Request};
///
/// let json = encode_request(&Request::disconnect().with_id("3")).unwrap();
/// assert_eq!(json, r#"{"channel":"/meta/disconnect","id":"3"}"#);
/// ```
pub fn encode_request(request: &Request) -> ProtocolResult<String> {
    encode(request)
}

fn encode<T: Serialize + ?Sized>(value: &T) -> ProtocolResult<String> {
    let json = serde_json::to_string(value)?;
    check_size(json.len())?;
    Ok(json)
}

fn check_size(size: usize) -> ProtocolResult<()> {
    if size > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}

/// Splits a received payload into individual messages.
///
/// Array elements are returned as-is, without checking that each one is an
/// object, so that a single bad element can be reported on its own.
///
/// # Errors
///
/// Returns an error if the payload is blank, too large, not JSON, or neither
/// an object nor an array.
pub fn decode_messages(payload: &str) -> ProtocolResult<Vec<Value>> {
    if payload.trim().is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    check_size(payload.len())?;

    match serde_json::from_str::<Value>(payload)? {
        Value::Array(items) => Ok(items),
        value @ Value::Object(_) => Ok(vec![value]),
        _ => Err(ProtocolError::NotAnObject),
    }
}

/// Serializes requests into a buffer reused across calls.
#[derive(Debug, Default)]
pub struct MessageWriter {
    buffer: Vec<u8>,
}

impl MessageWriter {
    /// Creates a writer with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes one request, replacing the previous contents.
    pub fn write(&mut self, request: &Request) -> ProtocolResult<&[u8]> {
        self.write_value(request)
    }

    fn write_value<T: Serialize + ?Sized>(&mut self, value: &T) -> ProtocolResult<&[u8]> {
        self.buffer.clear();
        serde_json::to_writer(&mut self.buffer, value)?;
        check_size(self.buffer.len())?;
        Ok(&self.buffer)
    }

    /// Returns the current buffer capacity.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}
