//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits so a config file can supply any subset of
//! fields; CLI flags are layered on top in `main`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::config::loader::ConfigError;

/// Root configuration for the capture proxy.
///
/// Immutable once the listener starts; shared via `Arc` with every exchange.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Base URI requests are forwarded to (scheme, host, port, base path).
    pub target: String,

    /// Port the proxy listens on (bound to localhost only).
    pub port: u16,

    /// Persist a transcript of every inbound request.
    pub capture_requests: bool,

    /// Persist a transcript of every upstream response.
    pub capture_responses: bool,

    /// Directory transcripts are written to. Required when capturing.
    pub output_directory: Option<PathBuf>,

    /// Skip upstream TLS certificate verification.
    pub allow_insecure_tls: bool,

    /// Forward `accept-encoding` instead of stripping it.
    pub pass_through_compression: bool,

    /// Debug-level logging.
    pub verbose: bool,

    /// No logging at all.
    pub silent: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            port: 8000,
            capture_requests: false,
            capture_responses: false,
            output_directory: None,
            allow_insecure_tls: false,
            pass_through_compression: false,
            verbose: false,
            silent: false,
        }
    }
}

impl ProxyConfig {
    /// Create a configuration for the given target with all other fields defaulted.
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// True when either transcript kind is enabled.
    pub fn captures(&self) -> bool {
        self.capture_requests || self.capture_responses
    }
}

/// Upstream scheme, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parsed forwarding target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// The base URI as configured (after URL normalisation).
    pub base_uri: String,
    pub scheme: Scheme,
    pub hostname: String,
    /// Explicit port, `None` when the scheme default applies.
    pub port: Option<u16>,
    /// Path component of the base URI, e.g. `/root/`.
    pub base_path: String,
}

impl Target {
    /// Parse and validate a base URI. Only `http` and `https` are accepted.
    pub fn parse(base_uri: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(base_uri).map_err(|e| ConfigError::InvalidTarget {
            target: base_uri.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        };

        let hostname = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::InvalidTarget {
                target: base_uri.to_string(),
                reason: "missing host".to_string(),
            })?
            .to_string();

        Ok(Self {
            base_uri: url.as_str().to_string(),
            scheme,
            hostname,
            port: url.port(),
            base_path: url.path().to_string(),
        })
    }

    /// Value used to rewrite an inbound `host` header: `hostname[:port]`.
    pub fn host_header(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.hostname, port),
            None => self.hostname.clone(),
        }
    }

    /// Effective port, falling back to the scheme default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(match self.scheme {
            Scheme::Http => 80,
            Scheme::Https => 443,
        })
    }
}
