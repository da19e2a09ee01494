//! Server configuration file
//!
//! Loads `[server]` and `[log]` settings from a TOML file. Every key is
//! optional; command line flags take precedence over file values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;

use crate::server::{ServerConfig, DEFAULT_BIND, DEFAULT_PORT};

/// Errors that can occur during config operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// `[server]` table
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Address to bind to
    pub bind: Option<String>,
    /// Port to listen on (0 picks an ephemeral port)
    pub port: Option<u16>,
    /// Largest accepted message in bytes
    pub max_message_size: Option<usize>,
    /// Largest accepted frame in bytes
    pub max_frame_size: Option<usize>,
}

/// `[log]` table
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    /// Default log level (trace, debug, info, warn, error)
    pub level: Option<String>,
}

/// Root of the configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EchoConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub log: LogSection,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub max_message_size: Option<usize>,
}

impl EchoConfig {
    /// Load configuration from an explicit file path
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: EchoConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(bind) = &self.server.bind {
            if bind.trim().is_empty() {
                return Err(ConfigError::Invalid("server.bind must not be empty".to_string()));
            }
        }
        if self.server.max_message_size == Some(0) {
            return Err(ConfigError::Invalid(
                "server.max_message_size must be greater than 0".to_string(),
            ));
        }
        if self.server.max_frame_size == Some(0) {
            return Err(ConfigError::Invalid(
                "server.max_frame_size must be greater than 0".to_string(),
            ));
        }
        if let Some(level) = &self.log.level {
            Level::from_str(level)
                .map_err(|_| ConfigError::Invalid(format!("unknown log level: {}", level)))?;
        }
        Ok(())
    }

    /// Log level from the file, if any
    pub fn log_level(&self) -> Option<Level> {
        self.log
            .level
            .as_deref()
            .and_then(|level| Level::from_str(level).ok())
    }

    /// Build the server configuration: CLI first, then file, then defaults
    pub fn server_config(&self, cli: &CliOverrides) -> Result<ServerConfig, ConfigError> {
        let bind = cli
            .bind
            .clone()
            .or_else(|| self.server.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        if bind.trim().is_empty() {
            return Err(ConfigError::Invalid("bind address must not be empty".to_string()));
        }

        let max_message_size = cli.max_message_size.or(self.server.max_message_size);
        if max_message_size == Some(0) {
            return Err(ConfigError::Invalid(
                "max message size must be greater than 0".to_string(),
            ));
        }

        let port = cli.port.or(self.server.port).unwrap_or(DEFAULT_PORT);

        Ok(ServerConfig::new(bind, port)
            .with_max_message_size(max_message_size)
            .with_max_frame_size(self.server.max_frame_size))
    }
}
