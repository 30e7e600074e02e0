//! Configuration module for the dataflow server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values, which take
//! precedence over built-in defaults. Nothing is required.

use clap::Parser;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

/// Command-line arguments for the dataflow server
#[derive(Parser, Debug)]
#[command(name = "tcp-dataflow")]
#[command(version = "0.1.0")]
#[command(about = "Uppercasing echo port with read interest switched from a control port", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address both listeners bind to (e.g., 0.0.0.0)
    #[arg(short = 'b', long)]
    pub bind: Option<String>,

    /// Control port accepting stop-read / start-read
    #[arg(long)]
    pub command_port: Option<u16>,

    /// Data port echoing uppercased bytes
    #[arg(long)]
    pub echo_port: Option<u16>,

    /// Transfer buffer capacity in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Readiness events collected per poll
    #[arg(long)]
    pub events_capacity: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub reactor: ReactorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_command_port")]
    pub command_port: u16,
    #[serde(default = "default_echo_port")]
    pub echo_port: u16,
    /// Pending connection queue length per listener
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            command_port: default_command_port(),
            echo_port: default_echo_port(),
            backlog: default_backlog(),
        }
    }
}

/// Transfer buffer configuration
#[derive(Debug, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "default_buffer_size")]
    pub size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            size: default_buffer_size(),
        }
    }
}

/// Event loop configuration
#[derive(Debug, Deserialize)]
pub struct ReactorConfig {
    #[serde(default = "default_events_capacity")]
    pub events_capacity: usize,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            events_capacity: default_events_capacity(),
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

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_command_port() -> u16 {
    4444
}

fn default_echo_port() -> u16 {
    5555
}

fn default_backlog() -> i32 {
    1024
}

fn default_buffer_size() -> usize {
    65535
}

fn default_events_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: IpAddr,
    pub command_port: u16,
    pub echo_port: u16,
    pub backlog: i32,
    pub buffer_size: usize,
    pub events_capacity: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            command_port: default_command_port(),
            echo_port: default_echo_port(),
            backlog: default_backlog(),
            buffer_size: default_buffer_size(),
            events_capacity: default_events_capacity(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the process arguments and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Load configuration from an explicit argument list.
    ///
    /// The first item is the program name, as with `std::env::args_os`.
    #[cfg(test)]
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = CliArgs::try_parse_from(args).map_err(ConfigError::Cli)?;
        Self::from_cli(cli)
    }

    fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let bind_str = cli.bind.unwrap_or(toml_config.server.bind);
        let bind = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str.clone()))?;

        let config = Config {
            bind,
            command_port: cli.command_port.unwrap_or(toml_config.server.command_port),
            echo_port: cli.echo_port.unwrap_or(toml_config.server.echo_port),
            backlog: toml_config.server.backlog,
            buffer_size: cli.buffer_size.unwrap_or(toml_config.buffer.size),
            events_capacity: cli
                .events_capacity
                .unwrap_or(toml_config.reactor.events_capacity),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the reactor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer size must be non-zero"));
        }
        if self.events_capacity == 0 {
            return Err(ConfigError::Invalid("events capacity must be non-zero"));
        }
        // Both zero means two distinct OS-assigned ports.
        if self.command_port == self.echo_port && self.command_port != 0 {
            return Err(ConfigError::Invalid(
                "command and echo ports must be different",
            ));
        }
        Ok(())
    }

    /// Socket address for one of the configured ports.
    pub fn addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.bind, port)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Only [`Config::from_args`] reports these; `load` lets clap exit.
    #[cfg(test)]
    #[error("{0}")]
    Cli(clap::Error),
    #[error("Failed to read config file '{path}': {1}", path = .0.display())]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{path}': {1}", path = .0.display())]
    TomlParse(PathBuf, #[source] toml::de::Error),
    #[error("Invalid bind address '{0}'")]
    InvalidBind(String),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}
