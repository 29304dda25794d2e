// Configuration management module
// TOML settings, the PORT override, and where the file lives

pub mod settings;


pub use settings::{
    Config, ConfigError, DEFAULT_PORT, PORT_ENV_VAR, ServerConfig, WorkshopConfig,
};

use std::path::{Path, PathBuf};

/// Get the configuration directory path, preferring `override_dir`
#[inline]
pub fn get_config_dir(override_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Config::default_dir(),
    }
}

/// Render the effective configuration for display
#[inline]
pub fn show_config(config: &Config) -> anyhow::Result<String> {
    let mut rendered = format!("# {}\n", config.config_file_path().display());
    rendered.push_str(&toml::to_string_pretty(config)?);
    Ok(rendered)
}
