//! Console configuration loaded from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PistatError, Result};

/// Runtime settings for the console engine and its host loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Period between hold ticks.
    pub hold_interval_ms: u64,
    /// Lower bound of the randomized tween duration.
    pub tween_min_ms: u64,
    /// Upper bound of the randomized tween duration.
    pub tween_max_ms: u64,
    /// Maximum lines kept in the scrollback.
    pub scrollback_limit: usize,
    /// Maximum entries kept in the log book.
    pub log_capacity: usize,
    /// How long a request may wait for its acknowledgement.
    pub ack_timeout_ms: u64,
    /// How long an acknowledged request may wait for its terminal event.
    pub request_lifetime_ms: u64,
    /// Controller address as `host:port`. `None` runs offline.
    pub controller: Option<String>,
    pub reconnect_interval_ms: u64,
    /// Main loop frame period.
    pub tick_interval_ms: u64,
    /// Fixed seed for ping latency and tween jitter.
    pub entropy_seed: Option<u32>,
    /// Print the boot banner on start.
    pub banner: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            hold_interval_ms: 1000,
            tween_min_ms: 1200,
            tween_max_ms: 2100,
            scrollback_limit: 2000,
            log_capacity: 200,
            ack_timeout_ms: 15_000,
            request_lifetime_ms: 300_000,
            controller: None,
            reconnect_interval_ms: 5000,
            tick_interval_ms: 16,
            entropy_seed: None,
            banner: true,
        }
    }
}

impl ConsoleConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hold_interval_ms == 0 {
            return Err(PistatError::Config(
                "hold_interval_ms must be positive".to_string(),
            ));
        }
        if self.tween_min_ms > self.tween_max_ms {
            return Err(PistatError::Config(format!(
                "tween_min_ms ({}) exceeds tween_max_ms ({})",
                self.tween_min_ms, self.tween_max_ms
            )));
        }
        if self.scrollback_limit == 0 {
            return Err(PistatError::Config(
                "scrollback_limit must be positive".to_string(),
            ));
        }
        if let Some(addr) = &self.controller {
            split_address(addr)?;
        }
        Ok(())
    }

    /// The controller address split into host and port.
    pub fn controller_endpoint(&self) -> Result<Option<(String, u16)>> {
        self.controller.as_deref().map(split_address).transpose()
    }
}

fn split_address(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| PistatError::Config(format!("controller '{addr}' is not host:port")))?;
    if host.is_empty() {
        return Err(PistatError::Config(format!("controller '{addr}' has no host")));
    }
    let port = port
        .parse::<u16>()
        .map_err(|e| PistatError::Config(format!("controller port '{port}': {e}")))?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConsoleConfig::default();
        assert_eq!(c.hold_interval_ms, 1000);
        assert_eq!(c.tween_min_ms, 1200);
        assert_eq!(c.tween_max_ms, 2100);
        assert_eq!(c.ack_timeout_ms, 15_000);
        assert_eq!(c.request_lifetime_ms, 300_000);
        assert!(c.controller.is_none());
        assert!(c.banner);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn empty_document_is_default() {
        let c = ConsoleConfig::from_toml_str("").unwrap();
        assert_eq!(c, ConsoleConfig::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let c = ConsoleConfig::from_toml_str(
            r#"
hold_interval_ms = 250
controller = "127.0.0.1:5000"
entropy_seed = 42
"#,
        )
        .unwrap();
        assert_eq!(c.hold_interval_ms, 250);
        assert_eq!(c.entropy_seed, Some(42));
        assert_eq!(c.scrollback_limit, 2000);
        assert_eq!(
            c.controller_endpoint().unwrap(),
            Some(("127.0.0.1".to_string(), 5000))
        );
    }

    #[test]
    fn zero_hold_interval_rejected() {
        let err = ConsoleConfig::from_toml_str("hold_interval_ms = 0").unwrap_err();
        assert!(matches!(err, PistatError::Config(_)));
    }

    #[test]
    fn inverted_tween_window_rejected() {
        let err =
            ConsoleConfig::from_toml_str("tween_min_ms = 3000\ntween_max_ms = 100").unwrap_err();
        assert!(format!("{err}").contains("tween_min_ms"));
    }

    #[test]
    fn bad_controller_rejected() {
        assert!(ConsoleConfig::from_toml_str("controller = \"nohost\"").is_err());
        assert!(ConsoleConfig::from_toml_str("controller = \":80\"").is_err());
        assert!(ConsoleConfig::from_toml_str("controller = \"h:99999\"").is_err());
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = ConsoleConfig::from_toml_str("hold_interval_ms = [[[").unwrap_err();
        assert!(matches!(err, PistatError::TomlParse(_)));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let c = ConsoleConfig::load(Path::new("/nonexistent/pistat.toml")).unwrap();
        assert_eq!(c, ConsoleConfig::default());
    }

    #[test]
    fn serializes_back_to_toml() {
        let c = ConsoleConfig::default();
        let text = toml::to_string(&c).unwrap();
        let back = ConsoleConfig::from_toml_str(&text).unwrap();
        assert_eq!(back, c);
    }
}
