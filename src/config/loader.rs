//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;

/// Error type for configuration loading and validation.
///
/// Every variant is fatal and surfaces before any socket is opened.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Only http and https connections are supported (got `{0}`)")]
    UnsupportedScheme(String),

    #[error("Invalid target `{target}`: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("An output location must be specified when request or response capture is enabled")]
    MissingOutputDirectory,

    #[error("TLS setup failed: {0}")]
    Tls(String),
}

/// Load configuration from a TOML file.
///
/// Only syntax is checked here; semantic validation runs at listener
/// bootstrap, after CLI overrides have been applied.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;
    Ok(config)
}
