//! Error types for the PI STAT console.

use std::io;

/// Errors produced by the console crates.
#[derive(Debug, thiserror::Error)]
pub enum PistatError {
    /// A command handler rejected its input or failed while running.
    ///
    /// Displayed without a prefix because the dispatcher already wraps it
    /// in `Command '<name>' failed: ...`.
    #[error("{0}")]
    Command(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PistatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_display_is_bare() {
        let e = PistatError::Command("missing argument".into());
        assert_eq!(format!("{e}"), "missing argument");
    }

    #[test]
    fn config_error_display() {
        let e = PistatError::Config("hold_interval_ms must be positive".into());
        assert_eq!(
            format!("{e}"),
            "config error: hold_interval_ms must be positive"
        );
    }

    #[test]
    fn protocol_error_display() {
        let e = PistatError::Protocol("missing event name".into());
        assert_eq!(format!("{e}"), "protocol error: missing event name");
    }

    #[test]
    fn channel_error_display() {
        let e = PistatError::Channel("not connected".into());
        assert_eq!(format!("{e}"), "channel error: not connected");
    }

    #[test]
    fn io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let e: PistatError = io_err.into();
        let msg = format!("{e}");
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("refused"));
    }

    #[test]
    fn toml_error_from_conversion() {
        let toml_err = toml::from_str::<toml::Value>("this is [[[not valid toml").unwrap_err();
        let e: PistatError = toml_err.into();
        assert!(format!("{e}").contains("TOML parse error"));
    }

    #[test]
    fn json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let e: PistatError = json_err.into();
        assert!(format!("{e}").contains("JSON error"));
    }
}
