//! Request and response types for the Bayeux meta channels.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::advice::Advice;
use crate::bayeux_error::BayeuxError;
use crate::channel::{
    self, Channel, META_CONNECT, META_DISCONNECT, META_HANDSHAKE, META_SUBSCRIBE,
    META_UNSUBSCRIBE,
};
use crate::error::{ProtocolError, ProtocolResult};
use crate::{BAYEUX_VERSION, LONG_POLLING};

/// HTTP method used to carry a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET.
    Get,
    /// POST (the Bayeux default).
    #[default]
    Post,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// Parameters announced by the client during handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeParams {
    /// Protocol version.
    pub version: String,
    /// Oldest protocol version the client accepts.
    pub minimum_version: String,
    /// Connection types the client supports.
    pub supported_connection_types: Vec<String>,
    /// Extension payload sent with the handshake.
    pub ext: Option<Value>,
}

impl Default for HandshakeParams {
    fn default() -> Self {
        Self {
            version: BAYEUX_VERSION.to_string(),
            minimum_version: BAYEUX_VERSION.to_string(),
            supported_connection_types: vec![LONG_POLLING.to_string()],
            ext: None,
        }
    }
}

impl HandshakeParams {
    /// Builder: set version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Builder: set minimum version.
    pub fn with_minimum_version(mut self, version: impl Into<String>) -> Self {
        self.minimum_version = version.into();
        self
    }

    /// Builder: set supported connection types.
    pub fn with_connection_types(mut self, types: Vec<String>) -> Self {
        self.supported_connection_types = types;
        self
    }

    /// Builder: set extension payload.
    pub fn with_ext(mut self, ext: Value) -> Self {
        self.ext = Some(ext);
        self
    }
}

/// A message sent from the client to the server.
///
/// Channel-specific members (`subscription`, `connectionType`, `version`, ...)
/// live in `fields` and are flattened into the JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Target channel.
    pub channel: Channel,

    /// Client identity, filled from the connection when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Correlation ID echoed by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Application payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Extension payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    /// Channel-specific members.
    #[serde(flatten)]
    pub fields: Map<String, Value>,

    /// HTTP method used to carry this request.
    #[serde(skip)]
    pub method: Method,
}

impl Request {
    /// Creates an empty request on a channel.
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            client_id: None,
            id: None,
            data: None,
            ext: None,
            fields: Map::new(),
            method: Method::default(),
        }
    }

    /// Creates a `/meta/handshake` request.
    pub fn handshake(params: &HandshakeParams) -> Self {
        let mut request = Self::new(meta(META_HANDSHAKE))
            .with_field("minimumVersion", params.minimum_version.clone())
            .with_field(
                "supportedConnectionTypes",
                params.supported_connection_types.clone(),
            )
            .with_field("version", params.version.clone());
        request.ext = params.ext.clone();
        request
    }

    /// Creates a `/meta/connect` request.
    pub fn connect(connection_type: &str) -> Self {
        Self::new(meta(META_CONNECT)).with_field("connectionType", connection_type)
    }

    /// Creates a `/meta/disconnect` request.
    pub fn disconnect() -> Self {
        Self::new(meta(META_DISCONNECT))
    }

    /// Creates a `/meta/subscribe` request.
    pub fn subscribe(channel: &Channel) -> Self {
        Self::new(meta(META_SUBSCRIBE)).with_field("subscription", channel.name())
    }

    /// Creates a `/meta/unsubscribe` request.
    pub fn unsubscribe(channel: &Channel) -> Self {
        Self::new(meta(META_UNSUBSCRIBE)).with_field("subscription", channel.name())
    }

    /// Creates a publish request carrying `data` on an application channel.
    pub fn publish(channel: Channel, data: Value) -> Self {
        Self::new(channel).with_data(data)
    }

    /// Parses a request from raw JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not an object with a valid channel.
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Builder: set client ID.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Builder: set correlation ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder: set data payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Builder: set extension payload.
    pub fn with_ext(mut self, ext: Value) -> Self {
        self.ext = Some(ext);
        self
    }

    /// Builder: set HTTP method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Builder: set a channel-specific member.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns the `subscription` member of subscribe/unsubscribe requests.
    pub fn subscription(&self) -> Option<&str> {
        self.fields.get("subscription").and_then(Value::as_str)
    }

    /// Returns true if this request targets a meta channel.
    pub fn is_meta(&self) -> bool {
        self.channel.is_meta()
    }
}

fn meta(name: &'static str) -> Channel {
    Channel::from_static(name)
}

/// A message received from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Channel the message was delivered on.
    pub channel: String,
    /// Correlation ID of the request this answers.
    pub id: Option<String>,
    /// Client identity.
    pub client_id: Option<String>,
    /// Success flag, absent on pushed events.
    pub successful: Option<bool>,
    /// Reconnection advice.
    pub advice: Option<Advice>,
    /// Parsed error member.
    pub error: Option<BayeuxError>,
    /// Application payload.
    pub data: Option<Value>,
    /// Extension payload.
    pub ext: Option<Value>,
    /// The raw message object.
    pub message: Map<String, Value>,
}

impl Response {
    /// Builds a response from a raw message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is not an object, has no channel, or
    /// carries wrongly typed members.
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        let Value::Object(message) = value else {
            return Err(ProtocolError::NotAnObject);
        };
        Self::from_map(message)
    }

    /// Builds a response from a raw message object.
    ///
    /// # Errors
    ///
    /// See [`Response::from_value`].
    pub fn from_map(message: Map<String, Value>) -> ProtocolResult<Self> {
        let channel = match message.get("channel") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(ProtocolError::MissingField("channel"));
            }
            Some(_) => return Err(ProtocolError::invalid_field("channel", "a string")),
        };

        let id = match message.get("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => return Err(ProtocolError::invalid_field("id", "a string or number")),
        };

        let successful = match message.get("successful") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => return Err(ProtocolError::invalid_field("successful", "a boolean")),
        };

        let advice = match message.get("advice") {
            None | Some(Value::Null) => None,
            Some(value) => Some(Advice::from_value(value)?),
        };

        let error = match message.get("error") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(BayeuxError::parse(s)?),
            Some(_) => return Err(ProtocolError::invalid_field("error", "a string")),
        };

        Ok(Self {
            channel,
            id,
            client_id: optional_string(&message, "clientId")?,
            successful,
            advice,
            error,
            data: non_null(&message, "data"),
            ext: non_null(&message, "ext"),
            message,
        })
    }

    /// Returns true if the server flagged the message as successful.
    pub fn is_successful(&self) -> bool {
        self.successful.unwrap_or(false)
    }

    /// Returns true if the message was delivered on a meta channel.
    pub fn is_meta(&self) -> bool {
        channel::is_meta(&self.channel)
    }

    /// Returns the raw message as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.message.clone())
    }

    fn expect_channel(&self, expected: &'static str) -> ProtocolResult<()> {
        if self.channel != expected {
            return Err(ProtocolError::UnexpectedChannel {
                expected,
                actual: self.channel.clone(),
            });
        }
        Ok(())
    }
}

fn optional_string(
    message: &Map<String, Value>,
    field: &'static str,
) -> ProtocolResult<Option<String>> {
    match message.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ProtocolError::invalid_field(field, "a string")),
    }
}

fn string_list(
    message: &Map<String, Value>,
    field: &'static str,
) -> ProtocolResult<Vec<String>> {
    match message.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ProtocolError::invalid_field(field, "an array of strings"))
            })
            .collect(),
        Some(_) => Err(ProtocolError::invalid_field(field, "a string or array of strings")),
    }
}

fn non_null(message: &Map<String, Value>, field: &str) -> Option<Value> {
    message.get(field).filter(|v| !v.is_null()).cloned()
}

/// Reply to `/meta/handshake`.
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeResponse {
    /// The underlying response.
    pub response: Response,
    /// Server protocol version.
    pub version: Option<String>,
    /// Oldest version the server accepts.
    pub minimum_version: Option<String>,
    /// Connection types the server supports.
    pub supported_connection_types: Vec<String>,
}

impl TryFrom<Response> for HandshakeResponse {
    type Error = ProtocolError;

    fn try_from(response: Response) -> ProtocolResult<Self> {
        response.expect_channel(META_HANDSHAKE)?;
        Ok(Self {
            version: optional_string(&response.message, "version")?,
            minimum_version: optional_string(&response.message, "minimumVersion")?,
            supported_connection_types: string_list(
                &response.message,
                "supportedConnectionTypes",
            )?,
            response,
        })
    }
}

/// Reply to `/meta/connect`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectResponse {
    /// The underlying response.
    pub response: Response,
}

impl TryFrom<Response> for ConnectResponse {
    type Error = ProtocolError;

    fn try_from(response: Response) -> ProtocolResult<Self> {
        response.expect_channel(META_CONNECT)?;
        Ok(Self { response })
    }
}

/// Reply to `/meta/disconnect`.
#[derive(Debug, Clone, PartialEq)]
pub struct DisconnectResponse {
    /// The underlying response.
    pub response: Response,
}

impl TryFrom<Response> for DisconnectResponse {
    type Error = ProtocolError;

    fn try_from(response: Response) -> ProtocolResult<Self> {
        response.expect_channel(META_DISCONNECT)?;
        Ok(Self { response })
    }
}

/// Reply to `/meta/subscribe`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeResponse {
    /// The underlying response.
    pub response: Response,
    /// Channels the reply refers to.
    pub subscriptions: Vec<String>,
}

impl SubscribeResponse {
    /// Returns the first subscription channel.
    pub fn subscription(&self) -> Option<&str> {
        self.subscriptions.first().map(String::as_str)
    }
}

impl TryFrom<Response> for SubscribeResponse {
    type Error = ProtocolError;

    fn try_from(response: Response) -> ProtocolResult<Self> {
        response.expect_channel(META_SUBSCRIBE)?;
        Ok(Self {
            subscriptions: string_list(&response.message, "subscription")?,
            response,
        })
    }
}

/// Reply to `/meta/unsubscribe`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsubscribeResponse {
    /// The underlying response.
    pub response: Response,
    /// Channels the reply refers to.
    pub subscriptions: Vec<String>,
}

impl UnsubscribeResponse {
    /// Returns the first subscription channel.
    pub fn subscription(&self) -> Option<&str> {
        self.subscriptions.first().map(String::as_str)
    }
}

impl TryFrom<Response> for UnsubscribeResponse {
    type Error = ProtocolError;

    fn try_from(response: Response) -> ProtocolResult<Self> {
        response.expect_channel(META_UNSUBSCRIBE)?;
        Ok(Self {
            subscriptions: string_list(&response.message, "subscription")?,
            response,
        })
    }
}

/// A received message, typed by channel.
#[derive(Debug, Clone, PartialEq)]
pub enum BayeuxResponse {
    /// `/meta/handshake` reply.
    Handshake(HandshakeResponse),
    /// `/meta/connect` reply.
    Connect(ConnectResponse),
    /// `/meta/disconnect` reply.
    Disconnect(DisconnectResponse),
    /// `/meta/subscribe` reply.
    Subscribe(SubscribeResponse),
    /// `/meta/unsubscribe` reply.
    Unsubscribe(UnsubscribeResponse),
    /// Any other message (publish acknowledgements, pushed events).
    Message(Response),
}

impl BayeuxResponse {
    /// Wraps a response in the typed variant matching its channel.
    ///
    /// # Errors
    ///
    /// Returns an error if channel-specific members are wrongly typed.
    pub fn classify(response: Response) -> ProtocolResult<Self> {
        Ok(match response.channel.as_str() {
            META_HANDSHAKE => Self::Handshake(response.try_into()?),
            META_CONNECT => Self::Connect(response.try_into()?),
            META_DISCONNECT => Self::Disconnect(response.try_into()?),
            META_SUBSCRIBE => Self::Subscribe(response.try_into()?),
            META_UNSUBSCRIBE => Self::Unsubscribe(response.try_into()?),
            _ => Self::Message(response),
        })
    }

    /// Returns the underlying response.
    pub fn response(&self) -> &Response {
        match self {
            Self::Handshake(r) => &r.response,
            Self::Connect(r) => &r.response,
            Self::Disconnect(r) => &r.response,
            Self::Subscribe(r) => &r.response,
            Self::Unsubscribe(r) => &r.response,
            Self::Message(r) => r,
        }
    }

    /// Returns the channel of the underlying response.
    pub fn channel(&self) -> &str {
        &self.response().channel
    }

    /// Returns the success flag of the underlying response.
    pub fn is_successful(&self) -> bool {
        self.response().is_successful()
    }
}
