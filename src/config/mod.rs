//! Configuration management

use crate::protocol::{DEFAULT_KEY, DEFAULT_LOCAL_PORT, DEFAULT_REMOTE_PORT};
use crate::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Local relay configuration
    pub local: Option<LocalConfig>,
    /// Remote relay configuration
    pub remote: Option<RemoteConfig>,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, crate::Error> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), crate::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| crate::Error::Config(format!("Failed to write config: {}", e)))
    }
}

/// Hardening limits. Every limit is off unless set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum concurrent connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
    /// Idle timeout in seconds. Bounds the handshake and the wait for the
    /// connect reply, and closes a relay once no bytes move in either
    /// direction for this long.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
    /// Outbound connect timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
}

impl Limits {
    /// Timeouts as a transport configuration
    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default()
            .with_connect_timeout(self.connect_timeout_secs.map(Duration::from_secs))
            .with_idle_timeout(self.idle_timeout_secs.map(Duration::from_secs))
    }
}

/// Local relay configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// SOCKS5 listen host
    pub listen_host: String,
    /// SOCKS5 listen port
    pub listen_port: u16,
    /// Remote relay host
    pub server_host: String,
    /// Remote relay port
    pub server_port: u16,
    /// Shared secret
    pub key: String,
    /// Hardening limits
    #[serde(flatten)]
    pub limits: Limits,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            listen_host: "127.0.0.1".to_string(),
            listen_port: DEFAULT_LOCAL_PORT,
            server_host: "127.0.0.1".to_string(),
            server_port: DEFAULT_REMOTE_PORT,
            key: DEFAULT_KEY.to_string(),
            limits: Limits::default(),
        }
    }
}

/// Remote relay configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Tunnel listen host
    pub listen_host: String,
    /// Tunnel listen port
    pub listen_port: u16,
    /// Shared secret
    pub key: String,
    /// Hardening limits
    #[serde(flatten)]
    pub limits: Limits,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            listen_port: DEFAULT_REMOTE_PORT,
            key: DEFAULT_KEY.to_string(),
            limits: Limits::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Generate example configuration
pub fn generate_example_config() -> Config {
    Config {
        local: Some(LocalConfig::default()),
        remote: Some(RemoteConfig::default()),
        logging: LoggingConfig::default(),
    }
}
