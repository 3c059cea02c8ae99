//! Configuration module for the bouncer.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::error::ConfigError;
use crate::runtime::{RelayOptions, DEFAULT_BUFFER_SIZE};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// What a worker does with buffered bytes when one peer closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CloseMode {
    /// Close both sockets at once, discarding anything still buffered.
    #[default]
    Immediate,
    /// Deliver bytes buffered toward the surviving peer, then close.
    Flush,
}

/// Command-line arguments for the bouncer
#[derive(Parser, Debug)]
#[command(name = "bouncer")]
#[command(version = "0.1.0")]
#[command(about = "Pairs TCP clients and relays bytes between them", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:7983)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen backlog
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Per-direction relay buffer size in bytes
    #[arg(short = 'b', long)]
    pub buffer_size: Option<usize>,

    /// Readiness wait timeout in seconds
    #[arg(long = "poll-timeout")]
    pub poll_timeout_secs: Option<u64>,

    /// Handling of buffered bytes when a peer disconnects
    #[arg(long, value_enum)]
    pub close_mode: Option<CloseMode>,

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
    pub relay: RelayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Pending-connection backlog
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            backlog: default_backlog(),
        }
    }
}

/// Relay worker configuration
#[derive(Debug, Deserialize)]
pub struct RelayConfig {
    /// Capacity of each directional buffer
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Readiness wait timeout in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default)]
    pub close_mode: CloseMode,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            poll_timeout_secs: default_poll_timeout(),
            close_mode: CloseMode::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
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

fn default_listen() -> String {
    "0.0.0.0:7983".to_string()
}

fn default_backlog() -> i32 {
    5
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_poll_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub backlog: i32,
    pub buffer_size: usize,
    pub poll_timeout: Duration,
    pub close_mode: CloseMode,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Resolve parsed CLI args, reading the TOML file they point at, if any.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents =
                std::fs::read_to_string(config_path).map_err(|source| ConfigError::FileRead {
                    path: config_path.clone(),
                    source,
                })?;
            toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
                path: config_path.clone(),
                source,
            })?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args over TOML values and validate the result.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let config = Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            buffer_size: cli.buffer_size.unwrap_or(toml_config.relay.buffer_size),
            poll_timeout: Duration::from_secs(
                cli.poll_timeout_secs
                    .unwrap_or(toml_config.relay.poll_timeout_secs),
            ),
            close_mode: cli.close_mode.unwrap_or(toml_config.relay.close_mode),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backlog <= 0 {
            return Err(ConfigError::Invalid {
                field: "backlog",
                reason: format!("must be greater than zero, got {}", self.backlog),
            });
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid {
                field: "buffer_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.poll_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "poll_timeout",
                reason: "must be at least one second".to_string(),
            });
        }
        Ok(())
    }

    /// Settings handed to every relay worker.
    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            buffer_size: self.buffer_size,
            poll_timeout: self.poll_timeout,
            close_mode: self.close_mode,
        }
    }
}
