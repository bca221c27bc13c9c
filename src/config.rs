//! # Configuration Management
//!
//! Centralized configuration for hosts, channels and the duplex transport.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - TOML strings via `from_toml()`
//! - Environment variables via `from_env()` (`DUPLEX_RPC_*`)
//! - Direct instantiation with defaults
//!
//! ## Compression
//! Hosts advertise compression in the interface sync reply and both sides
//! then compress payloads strictly larger than the threshold. The threshold
//! never drops below [`MIN_COMPRESSION_THRESHOLD`]; smaller configured values
//! are raised to the floor.

use crate::core::serialization::SerializationFormat;
use crate::error::{ProtocolError, Result};
use crate::transport::Endpoint;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Max allowed payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Smallest compression threshold a host will use
pub const MIN_COMPRESSION_THRESHOLD: usize = 1024;

/// Default compression threshold (128 KB)
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 128 * 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RpcConfig {
    /// Host-specific configuration
    #[serde(default)]
    pub host: HostConfig,

    /// Channel-specific configuration
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RpcConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::ConfigError(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `DUPLEX_RPC_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("DUPLEX_RPC_HOST_ADDRESS") {
            self.host.address = addr;
        }

        if let Some(addr) = lookup("DUPLEX_RPC_CHANNEL_ADDRESS") {
            self.channel.address = addr;
        }

        if let Some(val) = lookup("DUPLEX_RPC_USE_COMPRESSION").and_then(|v| v.parse::<bool>().ok()) {
            self.host.use_compression = val;
        }

        if let Some(val) = lookup("DUPLEX_RPC_COMPRESSION_THRESHOLD").and_then(|v| v.parse::<usize>().ok()) {
            self.host.compression_threshold = val;
        }

        if let Some(val) = lookup("DUPLEX_RPC_CONNECT_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.channel.connect_timeout = Duration::from_millis(val);
        }

        if let Some(val) = lookup("DUPLEX_RPC_MAX_CONNECTIONS").and_then(|v| v.parse::<usize>().ok()) {
            self.host.max_connections = val;
        }

        if let Some(val) = lookup("DUPLEX_RPC_OUTBOUND_QUEUE_DEPTH").and_then(|v| v.parse::<usize>().ok()) {
            self.transport.outbound_queue_depth = val;
        }
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

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.host.validate());
        errors.extend(self.channel.validate());
        errors.extend(self.transport.validate());
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

/// Host-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// TCP listen address (e.g., "127.0.0.1:8098")
    pub address: String,

    /// Whether payloads above the threshold are GZip-compressed
    pub use_compression: bool,

    /// Payload size (bytes) above which compression applies
    pub compression_threshold: usize,

    /// Format for object payloads and the sync table
    pub serialization: SerializationFormat,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Timeout for graceful host shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:8098"),
            use_compression: false,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            serialization: SerializationFormat::default(),
            max_connections: 1000,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
        }
    }
}

impl HostConfig {
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.address)
    }

    /// Threshold actually used on the wire, raised to the 1 KB floor
    pub fn effective_compression_threshold(&self) -> usize {
        self.compression_threshold.max(MIN_COMPRESSION_THRESHOLD)
    }

    /// Validate host configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Host address cannot be empty".to_string());
        } else if Endpoint::parse(&self.address).is_err() {
            errors.push(format!(
                "Invalid host address format: '{}' (expected '0.0.0.0:8098' or 'local:<path>')",
                self.address
            ));
        }

        if self.compression_threshold < MIN_COMPRESSION_THRESHOLD {
            errors.push(format!(
                "Compression threshold {} is below the minimum of {MIN_COMPRESSION_THRESHOLD} bytes",
                self.compression_threshold
            ));
        } else if self.compression_threshold > MAX_PAYLOAD_SIZE {
            errors.push("Compression threshold cannot be larger than max payload size".to_string());
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

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

/// Channel-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Target host address
    pub address: String,

    /// Hard deadline for establishing the connection
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Format for object payloads and the sync table
    pub serialization: SerializationFormat,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:8098"),
            connect_timeout: timeout::CONNECT_TIMEOUT,
            serialization: SerializationFormat::default(),
        }
    }
}

impl ChannelConfig {
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.address)
    }

    /// Validate channel configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Channel address cannot be empty".to_string());
        } else if Endpoint::parse(&self.address).is_err() {
            errors.push(format!(
                "Invalid channel address format: '{}' (expected '127.0.0.1:8098' or 'local:<path>')",
                self.address
            ));
        }

        if self.connect_timeout.as_millis() < 10 {
            errors.push("Connect timeout too short (minimum: 10ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connect timeout too long (maximum: 300s)".to_string());
        }

        errors
    }
}

/// Duplex transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Bytes requested from the socket per inbound read
    pub read_chunk_size: usize,

    /// Chunks the inbound pump may buffer ahead of the reader
    pub inbound_queue_depth: usize,

    /// Writes that may queue before `write` waits for the peer
    pub outbound_queue_depth: usize,

    /// Maximum allowed payload size in bytes
    pub max_payload_size: usize,

    /// How long `close` waits for queued writes to flush
    #[serde(with = "duration_serde")]
    pub close_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: 8192,
            inbound_queue_depth: 16,
            outbound_queue_depth: 32,
            max_payload_size: MAX_PAYLOAD_SIZE,
            close_timeout: timeout::CLOSE_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.read_chunk_size < 512 {
            errors.push("Read chunk size too small (minimum: 512 bytes)".to_string());
        } else if self.read_chunk_size > 1024 * 1024 {
            errors.push("Read chunk size too large (maximum: 1 MB)".to_string());
        }

        if self.inbound_queue_depth == 0 {
            errors.push("Inbound queue depth must be greater than 0".to_string());
        }

        if self.outbound_queue_depth == 0 {
            errors.push("Outbound queue depth must be greater than 0".to_string());
        } else if self.outbound_queue_depth > 1_000_000 {
            errors.push(format!(
                "Outbound queue depth too large: {} (max recommended: 1,000,000)",
                self.outbound_queue_depth
            ));
        }

        if self.max_payload_size < 1024 {
            errors.push("Max payload size too small (minimum: 1 KB)".to_string());
        } else if self.max_payload_size > MAX_PAYLOAD_SIZE {
            errors.push(format!(
                "Max payload size too large: {} bytes (maximum: {MAX_PAYLOAD_SIZE})",
                self.max_payload_size
            ));
        }

        if self.close_timeout.as_millis() < 10 {
            errors.push("Close timeout too short (minimum: 10ms)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
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

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("duplex-rpc"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match self.app_name.len() {
            0 => errors.push("Application name cannot be empty".to_string()),
            n if n > 64 => errors.push(format!("Application name too long: {n} characters (maximum: 64)")),
            _ => {}
        }

        match (self.log_to_file, self.log_file_path.as_deref()) {
            (true, None) => {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
            (true, Some(path)) => {
                let missing_dir = Path::new(path)
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty() && !dir.exists());
                if let Some(dir) = missing_dir {
                    errors.push(format!("Log file directory does not exist: {}", dir.display()));
                }
            }
            (false, _) if !self.log_to_console => {
                errors.push("At least one logging output (console or file) must be enabled".to_string());
            }
            _ => {}
        }

        errors
    }
}

/// Durations are written as integer milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Levels are written in lowercase (`"info"`) and parsed case-insensitively
mod log_level_serde {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse::<Level>()
            .map_err(|_| de::Error::custom(format!("Invalid log level: {text}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_threshold_floor() {
        let mut host = HostConfig::default();
        assert_eq!(host.effective_compression_threshold(), DEFAULT_COMPRESSION_THRESHOLD);
        host.compression_threshold = 10;
        assert_eq!(host.effective_compression_threshold(), MIN_COMPRESSION_THRESHOLD);
        assert!(host.validate().iter().any(|e| e.contains("below the minimum")));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DUPLEX_RPC_HOST_ADDRESS", "0.0.0.0:9100"),
            ("DUPLEX_RPC_USE_COMPRESSION", "true"),
            ("DUPLEX_RPC_COMPRESSION_THRESHOLD", "4096"),
            ("DUPLEX_RPC_CONNECT_TIMEOUT_MS", "750"),
            ("DUPLEX_RPC_MAX_CONNECTIONS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = RpcConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.host.address, "0.0.0.0:9100");
        assert!(config.host.use_compression);
        assert_eq!(config.host.compression_threshold, 4096);
        assert_eq!(config.channel.connect_timeout, Duration::from_millis(750));
        assert_eq!(config.host.max_connections, 1000);
    }

    #[test]
    fn test_toml_roundtrip() {
        let text = RpcConfig::example_config();
        let parsed = RpcConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.host.compression_threshold, DEFAULT_COMPRESSION_THRESHOLD);
        assert_eq!(parsed.host.serialization, SerializationFormat::Bincode);
    }
}
