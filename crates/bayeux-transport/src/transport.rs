//! The HTTP transport contract used by a Bayeux connection.
//!
//! A connection never talks to the network directly. Every request goes
//! through an [`HttpTransport`], which lets the same state machine run over
//! reqwest in production and over [`RecordedTransport`](crate::RecordedTransport)
//! in tests.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bayeux_protocol::Method;

use crate::error::{TransportError, TransportResult};

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How the response body should be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Decoding {
    /// Read the body as UTF-8 text.
    #[default]
    Text,
    /// Keep the raw bytes.
    Binary,
}

/// A single HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportRequest {
    /// Path relative to the transport's base URL. Empty means the base URL.
    pub path: String,
    /// Request body.
    pub body: Vec<u8>,
    /// HTTP method.
    pub method: Method,
    /// How to read the response body.
    pub decoding: Decoding,
    /// Extra headers for this request only.
    pub headers: Vec<(String, String)>,
    /// Overrides the transport's default timeout.
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    /// Creates a POST request with the given body.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Sets the path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the body as UTF-8 text, if it is valid.
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// A response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Decoded text.
    Text(String),
    /// Raw bytes.
    Binary(Vec<u8>),
}

impl Payload {
    /// Returns the body as text, decoding binary payloads as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an invalid response error if a binary payload is not UTF-8.
    pub fn into_text(self) -> TransportResult<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Binary(bytes) => String::from_utf8(bytes).map_err(|e| {
                TransportError::invalid_response("response body is not UTF-8").with_source(e)
            }),
        }
    }

    /// Returns the body length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Returns true for an empty body.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A completed HTTP response with a success status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Status description, e.g. `OK`.
    pub description: String,
    /// Response body.
    pub payload: Payload,
}

impl TransportResponse {
    /// Creates a 200 response carrying a text body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            description: "OK".to_string(),
            payload: Payload::Text(body.into()),
        }
    }

    /// Sets the status code and description.
    pub fn with_status(mut self, status: u16, description: impl Into<String>) -> Self {
        self.status = status;
        self.description = description.into();
        self
    }
}

/// Sends Bayeux payloads over HTTP.
///
/// Implementations must be cheap to call concurrently: a connection may have
/// one regular request and one long-poll outstanding at the same time.
/// Dropping the returned future cancels the request.
///
/// # Example
///
/// ```ignore
/// use bayeux_transport::{BoxFuture, HttpTransport, TransportRequest, TransportResponse, TransportResult};
///
/// struct Echo;
///
/// impl HttpTransport for Echo {
///     fn send(&self, request: TransportRequest) -> BoxFuture<'_, TransportResult<TransportResponse>> {
///         Box::pin(async move {
///             Ok(TransportResponse::ok(request.body_text().unwrap_or_default()))
///         })
///     }
/// }
/// ```
pub trait HttpTransport: Send + Sync {
    /// Sends a request and resolves with its response.
    ///
    /// A non-success HTTP status resolves to an error carrying that status.
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, TransportResult<TransportResponse>>;

    /// Default timeout for regular requests.
    fn timeout(&self) -> Duration {
        Duration::from_secs(crate::TransportConfig::DEFAULT_TIMEOUT_SECS)
    }

    /// Timeout applied to long-poll requests, which the server holds open.
    fn long_polling_timeout(&self) -> Duration {
        Duration::from_secs(crate::TransportConfig::DEFAULT_LONG_POLLING_TIMEOUT_SECS)
    }
}
