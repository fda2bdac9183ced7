//! Configuration for walkv
//!
//! Centralized configuration with sensible defaults. Values can be built
//! programmatically via [`Config::builder`] or loaded from a TOML file via
//! [`Config::load`]:
//!
//! ```toml
//! [network]
//! address = "127.0.0.1:4000"
//! max_connections = 10
//! max_message_size = "4KB"
//! idle_timeout = "5m"
//!
//! [wal]
//! enabled = true
//! data_directory = "./data/wal"
//! flushing_batch_size = 100
//! flushing_batch_timeout = "10ms"
//! max_segment_size = "10MB"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{KvError, Result};

/// The only storage engine type currently supported
pub const ENGINE_IN_MEMORY: &str = "in_memory";

/// Main configuration for a walkv instance
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage engine type (only `in_memory`)
    pub engine_type: String,

    pub network: NetworkConfig,

    pub logging: LoggingConfig,

    pub wal: WalConfig,
}

/// TCP server configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// TCP listen address
    pub address: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Longest accepted request line, in bytes
    pub max_message_size: usize,

    /// Connection is closed after this long without a request
    pub idle_timeout: Duration,
}

/// Logging configuration consumed by the server binary
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `walkv=debug`
    pub level: String,

    /// `stdout`, `stderr`, or a file path
    pub output: String,
}

/// Write-ahead log configuration
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// When false, writes are acknowledged without touching disk
    pub enabled: bool,

    /// Directory holding `wal_segment_*.log` files
    pub data_directory: PathBuf,

    /// Max records per group-commit flush
    pub flushing_batch_size: usize,

    /// Max latency before a partial batch is forced out
    pub flushing_batch_timeout: Duration,

    /// Segment is rotated once it reaches this many bytes
    pub max_segment_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_type: ENGINE_IN_MEMORY.to_string(),
            network: NetworkConfig::default(),
            logging: LoggingConfig::default(),
            wal: WalConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:4000".to_string(),
            max_connections: 10,
            max_message_size: 4 * 1024, // 4 KB
            idle_timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "stdout".to_string(),
        }
    }
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_directory: PathBuf::from("./data/wal"),
            flushing_batch_size: 100,
            flushing_batch_timeout: Duration::from_millis(10),
            max_segment_size: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load configuration from a TOML file.
    ///
    /// A missing file is not an error: defaults are returned. Keys absent
    /// from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            KvError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            KvError::Config(msg) => {
                KvError::Config(format!("{} (in '{}')", msg, path.display()))
            }
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| KvError::Config(format!("failed to parse config: {}", e)))?;

        let config = raw.resolve()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the rest of the system cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.engine_type != ENGINE_IN_MEMORY {
            return Err(KvError::Config(format!(
                "unsupported engine type '{}', expected '{}'",
                self.engine_type, ENGINE_IN_MEMORY
            )));
        }
        if self.network.max_connections == 0 {
            return Err(KvError::Config("network.max_connections must be positive".into()));
        }
        if self.network.max_message_size == 0 {
            return Err(KvError::Config("network.max_message_size must be positive".into()));
        }
        if self.wal.flushing_batch_size == 0 {
            return Err(KvError::Config("wal.flushing_batch_size must be positive".into()));
        }
        if self.wal.flushing_batch_timeout.is_zero() {
            return Err(KvError::Config("wal.flushing_batch_timeout must be positive".into()));
        }
        if self.wal.max_segment_size == 0 {
            return Err(KvError::Config("wal.max_segment_size must be positive".into()));
        }
        if self.wal.enabled && self.wal.data_directory.as_os_str().is_empty() {
            return Err(KvError::Config("wal.data_directory is not set".into()));
        }
        Ok(())
    }
}

// =============================================================================
// File Format
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    engine: RawEngine,
    network: RawNetwork,
    logging: RawLogging,
    wal: RawWal,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawEngine {
    #[serde(rename = "type")]
    engine_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawNetwork {
    address: Option<String>,
    max_connections: Option<usize>,
    max_message_size: Option<String>,
    idle_timeout: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawLogging {
    level: Option<String>,
    output: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawWal {
    enabled: Option<bool>,
    data_directory: Option<PathBuf>,
    flushing_batch_size: Option<usize>,
    flushing_batch_timeout: Option<String>,
    max_segment_size: Option<String>,
}

impl RawConfig {
    fn resolve(self) -> Result<Config> {
        let mut config = Config::default();

        if let Some(engine_type) = non_empty(self.engine.engine_type) {
            config.engine_type = engine_type;
        }

        if let Some(address) = non_empty(self.network.address) {
            config.network.address = address;
        }
        if let Some(count) = self.network.max_connections {
            config.network.max_connections = count;
        }
        if let Some(size) = non_empty(self.network.max_message_size) {
            config.network.max_message_size = parse_size(&size)? as usize;
        }
        if let Some(timeout) = non_empty(self.network.idle_timeout) {
            config.network.idle_timeout = parse_duration(&timeout)?;
        }

        if let Some(level) = non_empty(self.logging.level) {
            config.logging.level = level;
        }
        if let Some(output) = non_empty(self.logging.output) {
            config.logging.output = output;
        }

        if let Some(enabled) = self.wal.enabled {
            config.wal.enabled = enabled;
        }
        if let Some(dir) = self.wal.data_directory {
            config.wal.data_directory = dir;
        }
        if let Some(size) = self.wal.flushing_batch_size {
            config.wal.flushing_batch_size = size;
        }
        if let Some(timeout) = non_empty(self.wal.flushing_batch_timeout) {
            config.wal.flushing_batch_timeout = parse_duration(&timeout)?;
        }
        if let Some(size) = non_empty(self.wal.max_segment_size) {
            config.wal.max_segment_size = parse_size(&size)?;
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Value Parsing
// =============================================================================

/// Parse a size string such as `"4KB"`, `"10MB"` or `"512"` into bytes.
///
/// Suffixes are case-insensitive and use binary multiples.
pub fn parse_size(input: &str) -> Result<u64> {
    let normalized = input.trim().to_ascii_uppercase();

    let (digits, multiplier) = if let Some(n) = normalized.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = normalized.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = normalized.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = normalized.strip_suffix('B') {
        (n, 1)
    } else {
        (normalized.as_str(), 1)
    };

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| KvError::Config(format!("unknown size format: {}", input)))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| KvError::Config(format!("size out of range: {}", input)))
}

/// Parse a duration string such as `"10ms"`, `"5s"` or `"5m"`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| KvError::Config(format!("unknown duration format: {}", input)))?;

    let duration = match unit.trim() {
        "ns" => Duration::from_nanos(value),
        "us" => Duration::from_micros(value),
        "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        "h" => Duration::from_secs(value.saturating_mul(3600)),
        other => {
            return Err(KvError::Config(format!(
                "unknown duration unit '{}' in {}",
                other, input
            )))
        }
    };

    Ok(duration)
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Enable or disable the write-ahead log
    pub fn wal_enabled(mut self, enabled: bool) -> Self {
        self.config.wal.enabled = enabled;
        self
    }

    /// Set the WAL data directory
    pub fn data_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.wal.data_directory = path.into();
        self
    }

    /// Set the max number of records per flush
    pub fn flushing_batch_size(mut self, size: usize) -> Self {
        self.config.wal.flushing_batch_size = size;
        self
    }

    /// Set the max latency before a partial batch is flushed
    pub fn flushing_batch_timeout(mut self, timeout: Duration) -> Self {
        self.config.wal.flushing_batch_timeout = timeout;
        self
    }

    /// Set the segment rotation threshold (in bytes)
    pub fn max_segment_size(mut self, bytes: u64) -> Self {
        self.config.wal.max_segment_size = bytes;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.network.address = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.network.max_connections = count;
        self
    }

    /// Set the maximum request line length (in bytes)
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.config.network.max_message_size = bytes;
        self
    }

    /// Set the per-connection idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.network.idle_timeout = timeout;
        self
    }

    /// Set the log filter directive
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
