//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (http::server):
//!     Validate config → Build upstream client → Create output dir → Bind → Serve
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C or trigger() → Stop accepting → Drain exchanges → Exit 0
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
