//! Observability subsystem.
//!
//! Structured logging only. Every exchange runs inside a `debug` span
//! carrying its id, and the one-line `status - url` summary is an `info`
//! event.

pub mod logging;

pub use logging::{default_filter, init_logging};
