//! Configuration validation.
//!
//! # Responsibilities
//! - Target scheme must be `http` or `https`
//! - Capture requires an output directory
//!
//! # Design Decisions
//! - Pure function: `&ProxyConfig → Result<Target, ConfigError>`
//! - Runs before any socket is bound; the first violation aborts startup

use crate::config::loader::ConfigError;
use crate::config::schema::{ProxyConfig, Target};

/// Validate the configuration and return the parsed target.
pub fn validate_config(config: &ProxyConfig) -> Result<Target, ConfigError> {
    if config.captures() && config.output_directory.is_none() {
        return Err(ConfigError::MissingOutputDirectory);
    }

    Target::parse(&config.target)
}
