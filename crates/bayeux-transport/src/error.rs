//! Error types for HTTP transport operations.

use std::fmt;
use thiserror::Error;

/// The category of a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorCode {
    /// Connection failed, DNS resolution failed, or the body could not be read.
    NetworkError,
    /// The request did not complete within its timeout.
    Timeout,
    /// The server answered with a non-success HTTP status.
    HttpStatus,
    /// The request was abandoned before it completed.
    Cancelled,
    /// The body could not be decoded as requested.
    InvalidResponse,
    /// The transport is misconfigured (bad URL, bad header).
    ConfigurationError,
}

impl TransportErrorCode {
    /// Returns true if this error is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Timeout | Self::HttpStatus)
    }

    /// Returns a short name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::HttpStatus => "http_status",
            Self::Cancelled => "cancelled",
            Self::InvalidResponse => "invalid_response",
            Self::ConfigurationError => "configuration_error",
        }
    }
}

impl fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised while sending a request or reading its response.
#[derive(Debug, Error)]
pub struct TransportError {
    code: TransportErrorCode,
    message: String,
    /// HTTP status, when the server answered at all.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Creates a new error with the given code and message.
    pub fn new(code: TransportErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::NetworkError, message)
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::Timeout, message)
    }

    /// Creates an error for a non-success HTTP status.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(TransportErrorCode::HttpStatus, message);
        err.status = Some(status);
        err
    }

    /// Creates a cancellation error.
    pub fn cancelled() -> Self {
        Self::new(TransportErrorCode::Cancelled, "request cancelled")
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::InvalidResponse, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::ConfigurationError, message)
    }

    /// Sets the source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> TransportErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if the server replied.
    pub fn http_status(&self) -> Option<u16> {
        self.status
    }

    /// Returns true if the request may be retried.
    ///
    /// Client errors (4xx other than 408 and 429) are not retryable.
    pub fn is_retryable(&self) -> bool {
        match (self.code, self.status) {
            (TransportErrorCode::HttpStatus, Some(status)) => {
                status >= 500 || status == 408 || status == 429
            }
            (code, _) => code.is_retryable(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status {
            write!(f, "{} ({}): {}", self.code, status, self.message)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// A specialized Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
