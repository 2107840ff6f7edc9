//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → loader.rs (optional TOML file)
//!     → CLI overrides (main.rs)
//!     → validation.rs (scheme + output directory checks)
//!     → ProxyConfig + Target (validated, immutable)
//!     → shared via Arc with every exchange
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the listener starts
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ProxyConfig, Scheme, Target};
pub use validation::validate_config;
