//! HTTP transport configuration.

use std::time::Duration;
use url::Url;

/// Configuration for [`ReqwestTransport`](crate::ReqwestTransport).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL of the Bayeux endpoint, e.g. `https://example.com/cometd`.
    pub url: Url,

    /// Username for basic authentication.
    pub username: Option<String>,

    /// Password for basic authentication.
    pub password: Option<String>,

    /// Timeout for regular requests.
    pub timeout: Duration,

    /// Timeout for long-poll requests.
    pub long_polling_timeout: Duration,

    /// User agent string.
    pub user_agent: String,

    /// Headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl TransportConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Default long-poll timeout in seconds. Servers commonly hold a
    /// connect for 30 seconds, so this leaves headroom.
    pub const DEFAULT_LONG_POLLING_TIMEOUT_SECS: u64 = 60;

    /// Creates a configuration for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(url.as_ref())?;
        Ok(Self {
            url: parsed,
            username: None,
            password: None,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            long_polling_timeout: Duration::from_secs(Self::DEFAULT_LONG_POLLING_TIMEOUT_SECS),
            user_agent: format!("bayeux/{}", env!("CARGO_PKG_VERSION")),
            headers: Vec::new(),
        })
    }

    /// Sets basic authentication credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the long-poll timeout.
    pub fn with_long_polling_timeout(mut self, timeout: Duration) -> Self {
        self.long_polling_timeout = timeout;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns true if both username and password are set.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Resolves `path` against the base URL.
    ///
    /// An empty path yields the base URL. A relative path is appended to
    /// the base as a child, whether or not the base ends in `/`.
    pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
        if path.is_empty() {
            return Ok(self.url.clone());
        }
        if path.contains("://") {
            return Url::parse(path);
        }

        let mut base = self.url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
    }
}
