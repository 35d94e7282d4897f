//! Bayeux wire error strings.
//!
//! Servers report failures as `"<code>:<args>:<message>"` where `code` is
//! exactly three digits and `args` is a comma-separated list, for example
//! `"402:abc123:Unknown client"`. A string without any colon is a bare
//! message.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// A parsed Bayeux error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BayeuxError {
    /// Numeric error code, 0 when the server sent a bare message.
    pub code: u16,
    /// Arguments between the two colons.
    pub arguments: Vec<String>,
    /// Human-readable message.
    pub message: String,
}

impl BayeuxError {
    /// Creates an error with a code, arguments and message.
    pub fn new(code: u16, arguments: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            arguments,
            message: message.into(),
        }
    }

    /// Parses a wire error string.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedError`] if a colon is present but
    /// not at index 3, the code is not numeric, or the separator before the
    /// message is missing.
    pub fn parse(value: &str) -> ProtocolResult<Self> {
        let Some(first) = value.find(':') else {
            return Ok(Self {
                code: 0,
                arguments: Vec::new(),
                message: value.to_string(),
            });
        };

        if first != 3 {
            return Err(malformed(value, "code must be exactly three digits"));
        }

        let code_str = &value[..3];
        if !code_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed(value, "code is not a number"));
        }
        let code = code_str
            .parse::<u16>()
            .map_err(|_| malformed(value, "code is not a number"))?;

        let rest = &value[4..];
        if rest.is_empty() {
            return Ok(Self::new(code, Vec::new(), ""));
        }

        let second = rest
            .find(':')
            .ok_or_else(|| malformed(value, "missing separator before message"))?;

        let args = &rest[..second];
        let arguments = if args.is_empty() {
            Vec::new()
        } else {
            args.split(',').map(str::to_string).collect()
        };

        Ok(Self::new(code, arguments, &rest[second + 1..]))
    }

    /// Returns true if the server supplied a numeric code.
    pub fn has_code(&self) -> bool {
        self.code != 0
    }
}

fn malformed(value: &str, reason: &'static str) -> ProtocolError {
    ProtocolError::MalformedError {
        value: value.to_string(),
        reason,
    }
}

impl fmt::Display for BayeuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_code() && self.arguments.is_empty() {
            return f.write_str(&self.message);
        }
        write!(
            f,
            "{:03}:{}:{}",
            self.code,
            self.arguments.join(","),
            self.message
        )
    }
}

impl std::error::Error for BayeuxError {}

impl FromStr for BayeuxError {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        Self::parse(s)
    }
}

impl Serialize for BayeuxError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BayeuxError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}
