//! # Configuration Management
//!
//! Centralized configuration for the chat protocol library.
//!
//! This module provides structured configuration for servers and clients,
//! including listen/connect addresses, timeouts, wire limits, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides
//!
//! ## Notes on defaults
//! - The default response timeout is intentionally enormous (1,000,000 s),
//!   matching the wire protocol's historical behavior. Deployments that want
//!   real timeouts set `client.response_timeout` explicitly.
//! - The default record size cap (16 MiB) bounds allocation per frame; the
//!   wire format itself places no limit.

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default TCP port for the chat service
pub const DEFAULT_PORT: u16 = 8080;

/// Max allowed decoded record size (16 MiB)
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ChatConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Wire-format limits
    #[serde(default)]
    pub wire: WireConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ChatConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Start with defaults
        let mut config = Self::default();

        // Override with environment variables
        if let Ok(addr) = std::env::var("CHAT_PROTOCOL_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(addr) = std::env::var("CHAT_PROTOCOL_CLIENT_ADDRESS") {
            config.client.address = addr;
        }

        if let Ok(timeout) = std::env::var("CHAT_PROTOCOL_RESPONSE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.response_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(timeout) = std::env::var("CHAT_PROTOCOL_SHUTDOWN_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.server.shutdown_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(size) = std::env::var("CHAT_PROTOCOL_MAX_RECORD_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.wire.max_record_size = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.wire.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server listen address (e.g., "127.0.0.1:8080")
    pub address: String,

    /// Capacity of each connection's outbound command queue
    pub outbound_queue_limit: usize,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{DEFAULT_PORT}"),
            outbound_queue_limit: 32,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // Validate address format
        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:8080')",
                self.address
            ));
        }

        if self.outbound_queue_limit == 0 {
            errors.push("Outbound queue limit must be greater than 0".to_string());
        }

        // Validate shutdown timeout
        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        // Validate max connections
        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Target server address
    pub address: String,

    /// Timeout for connection attempts
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,

    /// Default timeout for waiting for a correlated response.
    /// Requests can override this per call.
    #[serde(with = "duration_serde")]
    pub response_timeout: Duration,

    /// Capacity of the outbound command queue
    pub outbound_queue_limit: usize,

    /// Capacity of the inbound notification queue
    pub notification_queue_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{DEFAULT_PORT}"),
            connection_timeout: timeout::DEFAULT_TIMEOUT,
            response_timeout: timeout::RESPONSE_TIMEOUT,
            outbound_queue_limit: 32,
            notification_queue_limit: 32,
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // Validate address format
        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid client address format: '{}' (expected format: 'example.com:8080')",
                self.address
            ));
        }

        // Validate timeouts
        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        }

        if self.response_timeout.as_millis() < 100 {
            errors.push("Response timeout too short (minimum: 100ms)".to_string());
        }

        if self.outbound_queue_limit == 0 {
            errors.push("Outbound queue limit must be greater than 0".to_string());
        }

        if self.notification_queue_limit == 0 {
            errors.push("Notification queue limit must be greater than 0".to_string());
        }

        errors
    }
}

/// Wire-format limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireConfig {
    /// Maximum allowed decoded record size in bytes.
    /// A frame announcing a larger record fails the connection.
    pub max_record_size: usize,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_record_size: MAX_RECORD_SIZE,
        }
    }
}

impl WireConfig {
    /// Validate wire configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_record_size == 0 {
            errors.push("Max record size cannot be 0".to_string());
        } else if self.max_record_size < 1024 {
            errors.push("Max record size too small (minimum: 1 KB)".to_string());
        } else if self.max_record_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max record size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_record_size
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("chat-protocol"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // Validate app name
        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        // Validate file logging configuration
        if self.log_to_file && self.log_file_path.is_none() {
            errors.push("log_file_path must be specified when log_to_file is true".to_string());
        }

        // Validate at least one output is enabled
        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ChatConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "default config invalid: {errors:?}");
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ChatConfig::default_with_overrides(|c| {
            c.server.address = String::from("0.0.0.0:9999");
            c.client.response_timeout = Duration::from_secs(30);
        });
        let toml = toml::to_string_pretty(&config).expect("serialize");
        let parsed = ChatConfig::from_toml(&toml).expect("parse");
        assert_eq!(parsed.server.address, "0.0.0.0:9999");
        assert_eq!(parsed.client.response_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "[server]\n\
             address = \"127.0.0.1:7000\"\n\
             outbound_queue_limit = 16\n\
             shutdown_timeout = 5000\n\
             max_connections = 10\n"
        )
        .expect("write");

        let config = ChatConfig::from_file(file.path()).expect("load");
        assert_eq!(config.server.address, "127.0.0.1:7000");
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(5));
        // omitted sections fall back to defaults
        assert_eq!(config.wire.max_record_size, MAX_RECORD_SIZE);
    }

    #[test]
    fn test_invalid_address_rejected() {
        let config = ChatConfig::default_with_overrides(|c| {
            c.server.address = String::from("not-an-address");
        });
        assert!(config.validate_strict().is_err());
    }

    #[test]
    fn test_zero_record_size_rejected() {
        let config = ChatConfig::default_with_overrides(|c| {
            c.wire.max_record_size = 0;
        });
        assert!(!config.validate().is_empty());
    }
}
