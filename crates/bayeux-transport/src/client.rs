//! reqwest-backed transport.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response};
use tracing::{trace, warn};

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};
use crate::transport::{
    BoxFuture, Decoding, HttpTransport, Payload, TransportRequest, TransportResponse,
};

const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// HTTP transport built on a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    config: TransportConfig,
}

impl ReqwestTransport {
    /// Creates a transport with the given configuration.
    pub fn new(config: TransportConfig) -> TransportResult<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                TransportError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn execute(&self, request: TransportRequest) -> TransportResult<TransportResponse> {
        let url = self.config.resolve(&request.path).map_err(|e| {
            TransportError::configuration(format!("Invalid request path {:?}", request.path))
                .with_source(e)
        })?;
        let method = Method::from_bytes(request.method.as_str().as_bytes()).map_err(|e| {
            TransportError::configuration(format!(
                "Invalid HTTP method: {}",
                request.method.as_str()
            ))
            .with_source(e)
        })?;
        let timeout = request.timeout.unwrap_or(self.config.timeout);

        let mut builder = self
            .client
            .request(method, url.clone())
            .timeout(timeout)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);

        for (name, value) in self.config.headers.iter().chain(request.headers.iter()) {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.basic_auth(username, Some(password));
        }

        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        trace!(method = %request.method.as_str(), url = %url, "Sending request");

        let response = builder.send().await.map_err(map_reqwest_error)?;
        handle_response(response, request.decoding).await
    }
}

async fn handle_response(
    response: Response,
    decoding: Decoding,
) -> TransportResult<TransportResponse> {
    let status = response.status();
    trace!(status = %status, "Received response");

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, body = %body, "Unexpected response status");
        return Err(TransportError::status(
            status.as_u16(),
            format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ),
        ));
    }

    let description = status.canonical_reason().unwrap_or_default().to_string();
    let payload = match decoding {
        Decoding::Text => Payload::Text(response.text().await.map_err(map_reqwest_error)?),
        Decoding::Binary => {
            Payload::Binary(response.bytes().await.map_err(map_reqwest_error)?.to_vec())
        }
    };

    Ok(TransportResponse {
        status: status.as_u16(),
        description,
        payload,
    })
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::timeout(format!("Request timed out: {}", err)).with_source(err)
    } else if err.is_decode() {
        TransportError::invalid_response(format!("Failed to decode body: {}", err)).with_source(err)
    } else {
        TransportError::network(format!("Request failed: {}", err)).with_source(err)
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, TransportResult<TransportResponse>> {
        Box::pin(self.execute(request))
    }

    fn timeout(&self) -> std::time::Duration {
        self.config.timeout
    }

    fn long_polling_timeout(&self) -> std::time::Duration {
        self.config.long_polling_timeout
    }
}
