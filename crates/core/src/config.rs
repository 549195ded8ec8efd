use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Response marker identifying the camera family in SSDP replies
pub const DEFAULT_SSDP_MARKER: &str = "UPnP/1.0 SonyImagingDevice/1.0";

/// Service directory assumed when SSDP is skipped or finds nothing
pub const DEFAULT_FALLBACK_URL: &str = "http://192.168.122.1:64321/dd.xml";

/// Top-level configuration, read from TOML
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ssdp: SsdpConfig,
    pub device: DeviceConfig,
    pub http: HttpConfig,
    pub sync: SyncConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsdpConfig {
    /// Give up after this many milliseconds without a matching reply
    pub wait_for_ms: u64,
    /// Repeat the M-SEARCH datagram this often
    pub send_every_ms: u64,
    pub marker: String,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            wait_for_ms: 50_000,
            send_every_ms: 3_000,
            marker: DEFAULT_SSDP_MARKER.to_string(),
        }
    }
}

impl SsdpConfig {
    pub fn wait_for(&self) -> Duration {
        Duration::from_millis(self.wait_for_ms)
    }

    pub fn send_every(&self) -> Duration {
        Duration::from_millis(self.send_every_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub fallback_url: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout for plain GETs and media downloads
    pub request_timeout_secs: u64,
    /// Timeout for SOAP Browse calls, which can be slow on large cards
    pub browse_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 50,
            browse_timeout_secs: 60,
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn browse_timeout(&self) -> Duration {
        Duration::from_secs(self.browse_timeout_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub destination: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("AlphaSync"),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path`, or fall back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ssdp.send_every_ms == 0 {
            return Err(Error::Config("ssdp.send_every_ms must be greater than zero".to_string()));
        }
        if self.ssdp.marker.is_empty() {
            return Err(Error::Config("ssdp.marker must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.ssdp.wait_for(), Duration::from_secs(50));
        assert_eq!(config.device.fallback_url, DEFAULT_FALLBACK_URL);
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml(
            r#"
[ssdp]
wait_for_ms = 100

[sync]
destination = "/tmp/photos"
"#,
        )
        .unwrap();

        assert_eq!(config.ssdp.wait_for_ms, 100);
        assert_eq!(config.ssdp.send_every_ms, 3_000);
        assert_eq!(config.sync.destination, PathBuf::from("/tmp/photos"));
        assert_eq!(config.http, HttpConfig::default());
    }

    #[test]
    fn test_zero_send_period_rejected() {
        let result = Config::from_toml("[ssdp]\nsend_every_ms = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
