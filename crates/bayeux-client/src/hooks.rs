//! Pluggable response handling.

use bayeux_protocol::{BayeuxResponse, ProtocolResult, Request, Response};
use serde_json::{Map, Value};

/// Customizes how received messages become responses.
///
/// Both methods run on the connection actor, so they must not block.
pub trait ResponseHooks: Send + Sync {
    /// Builds the response for one received message.
    ///
    /// The default parses the message and types it by channel.
    fn provide_response(&self, message: Map<String, Value>) -> ProtocolResult<BayeuxResponse> {
        BayeuxResponse::classify(Response::from_map(message)?)
    }

    /// Observes a processed response.
    ///
    /// `request` is the request the message was received for, if any.
    /// Returning `false` suppresses the `ResponseReceived` notification.
    fn process_response(&self, request: Option<&Request>, response: &BayeuxResponse) -> bool {
        let _ = (request, response);
        true
    }
}

/// Hooks with the default behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl ResponseHooks for DefaultHooks {}
