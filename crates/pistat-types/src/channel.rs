//! Logical output channels.
//!
//! Every line in the scrollback carries exactly one channel tag. The tag is
//! fixed when the line is written; only the active-channel selection moves.

use std::fmt;
use std::str::FromStr;

use crate::error::PistatError;

/// Prefix used by the textual form of device channels.
const DEVICE_PREFIX: &str = "device:";

/// Identifier of a logical output stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ChannelId {
    /// Console-wide output. Hidden while a device is selected.
    #[default]
    Global,
    /// Announcements about the console itself. Always visible.
    Meta,
    /// Output belonging to one remote device.
    Device(String),
}

impl ChannelId {
    /// Channel for the given device id.
    pub fn device(id: impl Into<String>) -> Self {
        Self::Device(id.into())
    }

    /// The device id, if this is a device channel.
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::Device(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_device(&self) -> bool {
        matches!(self, Self::Device(_))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Meta => write!(f, "meta"),
            Self::Device(id) => write!(f, "{DEVICE_PREFIX}{id}"),
        }
    }
}

impl FromStr for ChannelId {
    type Err = PistatError;

    /// Accepts `global`, `meta`, `device:<id>`, or a bare device id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PistatError::Channel("empty channel name".to_string()));
        }
        if trimmed.eq_ignore_ascii_case("global") {
            return Ok(Self::Global);
        }
        if trimmed.eq_ignore_ascii_case("meta") {
            return Ok(Self::Meta);
        }
        let id = trimmed.strip_prefix(DEVICE_PREFIX).unwrap_or(trimmed);
        if id.is_empty() {
            return Err(PistatError::Channel(format!("missing device id in '{s}'")));
        }
        Ok(Self::Device(id.to_string()))
    }
}
