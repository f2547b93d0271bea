//! Configuration module for the line-echo server.
//!
//! Supports both command-line arguments and an optional TOML configuration
//! file. CLI arguments take precedence over config file values, and the
//! defaults alone give the plain `line-echo [PORT]` behaviour.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the echo server
#[derive(Parser, Debug)]
#[command(name = "line-echo")]
#[command(version = "0.1.0")]
#[command(about = "Single-threaded TCP line-echo server", long_about = None)]
pub struct CliArgs {
    /// Port to listen on
    pub port: Option<u16>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Maximum number of pending connections
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Close a connection once either of its buffers exceeds this many bytes (0 = unlimited)
    #[arg(long)]
    pub max_buffer_bytes: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backlog: default_backlog(),
        }
    }
}

/// Per-connection I/O configuration
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    /// Upper bound on a single read
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    /// Buffer cap in bytes, 0 = unlimited
    #[serde(default)]
    pub max_buffer_bytes: usize,
    /// Events drained per poll call
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: default_read_chunk_size(),
            max_buffer_bytes: 0,
            event_capacity: default_event_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9090
}

fn default_backlog() -> i32 {
    128
}

fn default_read_chunk_size() -> usize {
    4096
}

fn default_event_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backlog: i32,
    pub read_chunk_size: usize,
    pub max_buffer_bytes: usize,
    pub event_capacity: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(CliArgs::empty(), TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from process arguments and the optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Resolve parsed CLI arguments against the config file they name.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let config = Self::merge(cli, toml_config);
        config.validate()?;
        Ok(config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port: cli.port.unwrap_or(toml_config.server.port),
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            read_chunk_size: toml_config.connection.read_chunk_size,
            max_buffer_bytes: cli
                .max_buffer_bytes
                .unwrap_or(toml_config.connection.max_buffer_bytes),
            event_capacity: toml_config.connection.event_capacity,
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // A zero-length read is indistinguishable from the peer closing.
        if self.read_chunk_size == 0 {
            return Err(ConfigError::Invalid("read_chunk_size must be greater than 0"));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be greater than 0"));
        }
        if self.backlog <= 0 {
            return Err(ConfigError::Invalid("backlog must be greater than 0"));
        }
        Ok(())
    }
}

impl CliArgs {
    fn empty() -> Self {
        Self {
            port: None,
            config: None,
            host: None,
            backlog: None,
            max_buffer_bytes: None,
            log_level: None,
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
