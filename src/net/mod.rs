//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection on localhost:<port>
//!     → listener.rs (bind, loopback only)
//!     → Hand off to the HTTP layer (axum::serve)
//! ```

pub mod listener;

pub use listener::{bind_localhost, ListenerError};
