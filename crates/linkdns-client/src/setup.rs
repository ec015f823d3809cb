//! Config loading and default paths.

use std::path::PathBuf;

use tracing::info;

use crate::config::Config;
use crate::error::ClientError;

/// Load configuration from the given path, or the default location.
pub fn load_config(path: Option<&str>) -> Result<Config, ClientError> {
    let config_path = match path {
        Some(p) => PathBuf::from(p),
        None => default_config_path(),
    };

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ClientError::Config(format!("failed to read config: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {e}")))?;
        info!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else if path.is_some() {
        Err(ClientError::Config(format!(
            "config file not found: {}",
            config_path.display()
        )))
    } else {
        info!("no config file found, using defaults");
        Ok(Config::default())
    }
}

/// Get the default config directory path.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("linkdns")
}

fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}
