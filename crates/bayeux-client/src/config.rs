//! Client configuration.
//!
//! Settings live in a single `config.toml`, by default at
//! `~/.config/bayeux/config.toml`:
//!
//! ```toml
//! [server]
//! url = "https://example.com"
//! path = "/cometd"
//! timeout = 30
//!
//! [server.headers]
//! X-Api-Key = "secret"
//!
//! [long_polling]
//! connect_retries = 5
//! retry_delay_ms = 2000
//!
//! [handshake]
//! connection_types = ["long-polling"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bayeux_protocol::{BAYEUX_VERSION, HandshakeParams, LONG_POLLING};
use bayeux_transport::TransportConfig;
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionOptions;
use crate::error::{ClientError, ClientResult};

/// Configuration for the bayeux client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Server settings.
    pub server: ServerSettings,

    /// Long-polling settings.
    pub long_polling: LongPollingSettings,

    /// Handshake settings.
    pub handshake: HandshakeSettings,
}

/// Where and how to reach the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server base URL.
    pub url: Option<String>,

    /// Bayeux endpoint path, appended to `url`.
    pub path: String,

    /// Request timeout in seconds.
    pub timeout: u64,

    /// Long-poll timeout in seconds.
    pub long_polling_timeout: u64,

    /// User agent override.
    pub user_agent: Option<String>,

    /// Basic auth username.
    pub username: Option<String>,

    /// Basic auth password.
    pub password: Option<String>,

    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: None,
            path: "/cometd".to_string(),
            timeout: TransportConfig::DEFAULT_TIMEOUT_SECS,
            long_polling_timeout: TransportConfig::DEFAULT_LONG_POLLING_TIMEOUT_SECS,
            user_agent: None,
            username: None,
            password: None,
            headers: BTreeMap::new(),
        }
    }
}

/// Long-polling loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LongPollingSettings {
    /// Whether `listen` starts long polling.
    pub enabled: bool,

    /// Consecutive failures before giving up.
    pub connect_retries: u32,

    /// Delay between retries, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for LongPollingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            connect_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Handshake parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeSettings {
    /// Protocol version sent to the server.
    pub version: String,

    /// Oldest protocol version the client accepts.
    pub minimum_version: String,

    /// Connection types offered to the server.
    pub connection_types: Vec<String>,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            version: BAYEUX_VERSION.to_string(),
            minimum_version: BAYEUX_VERSION.to_string(),
            connection_types: vec![LONG_POLLING.to_string()],
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if absent.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| ClientError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bayeux")
    }

    /// Returns the full endpoint URL: `server.url` joined with `server.path`.
    pub fn endpoint(&self) -> ClientResult<String> {
        let base = self
            .server
            .url
            .as_deref()
            .ok_or_else(|| ClientError::Config("server.url is not set".to_string()))?;
        let path = self.server.path.trim_matches('/');
        if path.is_empty() {
            Ok(base.to_string())
        } else {
            Ok(format!("{}/{}", base.trim_end_matches('/'), path))
        }
    }

    /// Builds the transport configuration.
    pub fn transport_config(&self) -> ClientResult<TransportConfig> {
        let endpoint = self.endpoint()?;
        let mut config = TransportConfig::new(&endpoint)
            .map_err(|e| ClientError::Config(format!("invalid server url {}: {}", endpoint, e)))?
            .with_timeout(Duration::from_secs(self.server.timeout))
            .with_long_polling_timeout(Duration::from_secs(self.server.long_polling_timeout));

        if let Some(ref user_agent) = self.server.user_agent {
            config = config.with_user_agent(user_agent);
        }
        match (&self.server.username, &self.server.password) {
            (Some(username), Some(password)) => {
                config = config.with_credentials(username, password);
            }
            (None, None) => {}
            _ => {
                return Err(ClientError::Config(
                    "server.username and server.password must be set together".to_string(),
                ));
            }
        }
        for (name, value) in &self.server.headers {
            config = config.with_header(name, value);
        }
        Ok(config)
    }

    /// Builds connection options.
    pub fn connection_options(&self) -> ConnectionOptions {
        let handshake = HandshakeParams::default()
            .with_version(&self.handshake.version)
            .with_minimum_version(&self.handshake.minimum_version)
            .with_connection_types(self.handshake.connection_types.clone());

        ConnectionOptions::default()
            .with_handshake(handshake)
            .with_long_polling_retries(
                self.long_polling.connect_retries,
                Duration::from_millis(self.long_polling.retry_delay_ms),
            )
    }
}
