//! Channel names.
//!
//! A channel is a `/`-delimited path made of ASCII letters, digits and the
//! marks `-_!~()$@/`. Segments are produced by a plain split on `/`, so
//! leading, trailing and doubled slashes yield empty segments.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Prefix shared by all meta channels.
pub const META_PREFIX: &str = "/meta";
/// Handshake meta channel.
pub const META_HANDSHAKE: &str = "/meta/handshake";
/// Connect meta channel.
pub const META_CONNECT: &str = "/meta/connect";
/// Disconnect meta channel.
pub const META_DISCONNECT: &str = "/meta/disconnect";
/// Subscribe meta channel.
pub const META_SUBSCRIBE: &str = "/meta/subscribe";
/// Unsubscribe meta channel.
pub const META_UNSUBSCRIBE: &str = "/meta/unsubscribe";

static CHANNEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-_!~()$@/]+$").expect("Invalid channel regex"));

/// A validated Bayeux channel name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Channel {
    name: String,
}

impl Channel {
    /// Creates a channel, validating its name.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidChannel`] if the name is empty or has
    /// a character outside the allowed set.
    pub fn new(name: impl Into<String>) -> ProtocolResult<Self> {
        let name = name.into();
        if !Self::is_valid(&name) {
            return Err(ProtocolError::InvalidChannel(name));
        }
        Ok(Self { name })
    }

    /// Wraps one of the meta channel constants.
    pub(crate) fn from_static(name: &'static str) -> Self {
        debug_assert!(Self::is_valid(name));
        Self {
            name: name.to_string(),
        }
    }

    /// Returns true if `name` is a syntactically valid channel.
    pub fn is_valid(name: &str) -> bool {
        CHANNEL_REGEX.is_match(name)
    }

    /// Returns the full channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the `/`-split segments, empty ones included.
    pub fn segments(&self) -> Vec<&str> {
        self.name.split('/').collect()
    }

    /// Returns true for `/meta/...` channels.
    pub fn is_meta(&self) -> bool {
        is_meta(&self.name)
    }
}

/// Returns true if `name` addresses a meta channel.
pub(crate) fn is_meta(name: &str) -> bool {
    name.starts_with(META_PREFIX)
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl TryFrom<String> for Channel {
    type Error = ProtocolError;

    fn try_from(value: String) -> ProtocolResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Channel {
    type Error = ProtocolError;

    fn try_from(value: &str) -> ProtocolResult<Self> {
        Self::new(value)
    }
}

impl std::str::FromStr for Channel {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        Self::new(s)
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.name
    }
}

impl PartialEq<str> for Channel {
    fn eq(&self, other: &str) -> bool {
        self.name == other
    }
}

impl PartialEq<&str> for Channel {
    fn eq(&self, other: &&str) -> bool {
        self.name == *other
    }
}
