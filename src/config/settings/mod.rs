#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding the HTTP port
pub const PORT_ENV_VAR: &str = "PORT";

/// Port used by the HTTP transport when nothing else is configured
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workshop: WorkshopConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Name reported to clients during `initialize`
    pub name: String,
    pub version: String,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "mcp-workshop".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkshopConfig {
    /// Steps `long_task` runs when the caller does not say
    pub long_task_steps: u64,
    pub long_task_step_delay_ms: u64,
}

impl Default for WorkshopConfig {
    fn default() -> Self {
        Self {
            long_task_steps: 5,
            long_task_step_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid PORT value: '{0}' (must be a number between 1 and 65535)")]
    InvalidPortOverride(String),
    #[error("Invalid host: '{0}' (must be an IP address or 'localhost')")]
    InvalidHost(String),
    #[error("Invalid server name: cannot be empty")]
    InvalidServerName,
    #[error("Invalid long task steps: {0} (must be between 1 and 100)")]
    InvalidLongTaskSteps(u64),
    #[error("Invalid long task step delay: {0}ms (must be at most 60000)")]
    InvalidStepDelay(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("mcp-workshop"))
            .or_else(|| dirs::home_dir().map(|home| home.join(".mcp-workshop")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when
    /// the file does not exist, then apply the `PORT` override.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let mut config = Self::load_stored(config_dir)?;

        config
            .apply_port_override(env::var(PORT_ENV_VAR).ok().as_deref())
            .context("Failed to apply environment overrides")?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Load only what `config.toml` and the defaults say, ignoring the
    /// environment. This is what gets written back by `save`.
    #[inline]
    pub fn load_stored<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            toml::from_str(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Self::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Replace the configured port with `value` when one is set. Empty
    /// values are ignored.
    #[inline]
    pub fn apply_port_override(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
            return Ok(());
        };

        match value.parse::<u16>() {
            Ok(port) if port != 0 => {
                self.server.port = port;
                Ok(())
            }
            _ => Err(ConfigError::InvalidPortOverride(value.to_string())),
        }
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.workshop.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidServerName);
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.ip_addr()?;
        Ok(())
    }

    fn ip_addr(&self) -> Result<IpAddr, ConfigError> {
        if self.host == "localhost" {
            return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
        self.host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.host.clone()))
    }

    /// Address the HTTP transport binds to
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.ip_addr()?, self.port))
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }
}

impl WorkshopConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.long_task_steps) {
            return Err(ConfigError::InvalidLongTaskSteps(self.long_task_steps));
        }

        if self.long_task_step_delay_ms > 60_000 {
            return Err(ConfigError::InvalidStepDelay(self.long_task_step_delay_ms));
        }

        Ok(())
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.long_task_step_delay_ms)
    }
}
